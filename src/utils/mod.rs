pub mod url_validation;
