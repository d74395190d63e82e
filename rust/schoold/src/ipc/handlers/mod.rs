pub mod assessments;
pub mod core;
pub mod grades;
pub mod sections;
pub mod settings;
pub mod students;
pub mod subjects;
