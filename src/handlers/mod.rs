pub mod option;
pub mod question;
pub mod run;
pub mod survey;
