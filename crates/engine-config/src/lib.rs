pub mod report {
    pub mod issue;
}

pub mod settings;

pub mod validation {
    pub mod static_checks;
}
