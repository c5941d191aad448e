pub mod checklist;
pub mod condition;
pub mod draft;
pub mod input;
pub mod label;
pub mod response;
pub mod rules;
pub mod template;
