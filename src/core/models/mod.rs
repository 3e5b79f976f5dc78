pub mod answer;
pub mod option;
pub mod question;
pub mod run;
pub mod stats;
pub mod survey;
