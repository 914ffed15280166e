pub mod step_record;
pub mod template_record;

pub use step_record::StepRecord;
pub use template_record::TemplateRecord;
