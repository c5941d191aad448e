use kinesis_core::models::template::NoteRole;

use crate::error::NoteError;

/// Fixed wording for one locale. Placeholders in braces (`{item}`,
/// `{delta}`, ...) are substituted by [`fill`].
#[derive(Debug, Clone)]
pub struct Phrases {
    pub locale: String,
    pub title: String,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub caveats: String,
    pub nothing_recorded: String,
    pub yes: String,
    pub no: String,
    pub minutes: String,
    pub improved: String,
    pub worsened: String,
    pub unchanged: String,
    pub skipped: String,
    pub skipped_with_reason: String,
    pub not_recorded: String,
    pub empty_required_section: String,
    pub omitted_section: String,
    pub no_note_role: String,
    pub render_failed: String,
}

impl Phrases {
    pub fn for_locale(locale: &str) -> Result<Self, NoteError> {
        match locale {
            "en" => Ok(Self::english()),
            "ar" => Ok(Self::arabic()),
            other => Err(NoteError::UnsupportedLocale(other.to_string())),
        }
    }

    pub fn heading(&self, role: NoteRole) -> &str {
        match role {
            NoteRole::Subjective => &self.subjective,
            NoteRole::Objective => &self.objective,
            NoteRole::Assessment => &self.assessment,
            NoteRole::Plan => &self.plan,
        }
    }

    pub fn english() -> Self {
        Self {
            locale: "en".to_string(),
            title: "Clinical Note".to_string(),
            subjective: "Subjective".to_string(),
            objective: "Objective".to_string(),
            assessment: "Assessment".to_string(),
            plan: "Plan".to_string(),
            caveats: "Caveats".to_string(),
            nothing_recorded: "Nothing recorded.".to_string(),
            yes: "Yes".to_string(),
            no: "No".to_string(),
            minutes: "min".to_string(),
            improved: "improved by {delta} from baseline {baseline}".to_string(),
            worsened: "worsened by {delta} from baseline {baseline}".to_string(),
            unchanged: "unchanged from baseline {baseline}".to_string(),
            skipped: "{item} was skipped".to_string(),
            skipped_with_reason: "{item} was skipped: {reason}".to_string(),
            not_recorded: "{item} was not recorded".to_string(),
            empty_required_section: "Required section {section} has no recorded findings"
                .to_string(),
            omitted_section: "[Section {section} omitted: {cause}]".to_string(),
            no_note_role: "no note role assigned".to_string(),
            render_failed: "rendering failed".to_string(),
        }
    }

    pub fn arabic() -> Self {
        Self {
            locale: "ar".to_string(),
            title: "ملاحظة سريرية".to_string(),
            subjective: "ذاتي".to_string(),
            objective: "موضوعي".to_string(),
            assessment: "التقييم".to_string(),
            plan: "الخطة".to_string(),
            caveats: "تنبيهات".to_string(),
            nothing_recorded: "لم يتم تسجيل أي شيء.".to_string(),
            yes: "نعم".to_string(),
            no: "لا".to_string(),
            minutes: "دقيقة".to_string(),
            improved: "تحسن بمقدار {delta} عن خط الأساس {baseline}".to_string(),
            worsened: "تراجع بمقدار {delta} عن خط الأساس {baseline}".to_string(),
            unchanged: "دون تغيير عن خط الأساس {baseline}".to_string(),
            skipped: "تم تخطي {item}".to_string(),
            skipped_with_reason: "تم تخطي {item}: {reason}".to_string(),
            not_recorded: "لم يتم تسجيل {item}".to_string(),
            empty_required_section: "القسم المطلوب {section} لا يحتوي على نتائج مسجلة"
                .to_string(),
            omitted_section: "[تم حذف القسم {section}: {cause}]".to_string(),
            no_note_role: "بدون تصنيف في الملاحظة".to_string(),
            render_failed: "فشل العرض".to_string(),
        }
    }
}

/// Substitute `{name}` placeholders in a phrase.
pub fn fill(phrase: &str, values: &[(&str, &str)]) -> String {
    let mut out = phrase.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
