//! Declarative field validation for request messages.
//!
//! Each request is described as a list of [`Field`]s carrying the rules that
//! apply to them. [`Validator::check`] evaluates every rule of every field and
//! reports all violations at once.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::password::MAX_PASSWORD_BYTES;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| unreachable!("{e}"));
}

/// A single field constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Value must not be empty.
    Required,
    /// Value must look like `local@domain.tld`.
    Email,
    /// At least `n` characters.
    Min(usize),
    /// At most `n` characters.
    Max(usize),
    /// At most `n` bytes of UTF-8.
    MaxBytes(usize),
    /// ASCII letters only.
    Alpha,
}

impl Rule {
    fn holds(self, value: &str) -> bool {
        match self {
            Rule::Required => !value.is_empty(),
            Rule::Email => EMAIL_RE.is_match(value),
            Rule::Min(n) => value.chars().count() >= n,
            Rule::Max(n) => value.chars().count() <= n,
            Rule::MaxBytes(n) => value.len() <= n,
            Rule::Alpha => value.chars().all(|c| c.is_ascii_alphabetic()),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("required"),
            Rule::Email => f.write_str("email"),
            Rule::Min(n) => write!(f, "min={n}"),
            Rule::Max(n) => write!(f, "max={n}"),
            Rule::MaxBytes(n) => write!(f, "max_bytes={n}"),
            Rule::Alpha => f.write_str("alpha"),
        }
    }
}

/// A named value together with the rules it must satisfy.
pub struct Field<'a> {
    name: &'static str,
    value: &'a str,
    rules: &'a [Rule],
}

impl<'a> Field<'a> {
    /// Describes a field to validate.
    pub fn new(name: &'static str, value: &'a str, rules: &'a [Rule]) -> Self {
        Self { name, value, rules }
    }
}

/// A rule that a field failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Field name.
    pub field: &'static str,
    /// The rule that did not hold.
    pub rule: Rule,
}

/// All violations found in one request. Never carries field values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    /// Every violation, in field order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Distinct names of the fields that failed, in field order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for v in &self.violations {
            if !names.contains(&v.field) {
                names.push(v.field);
            }
        }
        names
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .violations
            .iter()
            .map(|v| format!("{} failed '{}'", v.field, v.rule))
            .collect::<Vec<_>>();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Rule evaluator.
pub struct Validator;

impl Validator {
    /// Checks every field against its rules.
    ///
    /// An empty value that is not `Required` skips its remaining rules, so
    /// optional fields only need to be well-formed when present.
    pub fn check(fields: &[Field<'_>]) -> Result<(), ValidationErrors> {
        let mut violations = Vec::new();

        for field in fields {
            let required = field.rules.contains(&Rule::Required);
            if field.value.is_empty() && !required {
                continue;
            }
            for rule in field.rules {
                if !rule.holds(field.value) {
                    violations.push(Violation {
                        field: field.name,
                        rule: *rule,
                    });
                    if *rule == Rule::Required {
                        break;
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { violations })
        }
    }
}

const EMAIL_RULES: &[Rule] = &[Rule::Required, Rule::Email];
const USERNAME_RULES: &[Rule] = &[Rule::Required, Rule::Min(3), Rule::Max(30)];
const PASSWORD_RULES: &[Rule] = &[
    Rule::Required,
    Rule::Min(6),
    Rule::Max(50),
    Rule::MaxBytes(MAX_PASSWORD_BYTES),
];
const NAME_RULES: &[Rule] = &[Rule::Required, Rule::Alpha, Rule::Min(2), Rule::Max(30)];

/// Fields of a `Register` call.
pub struct RegisterInput<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl RegisterInput<'_> {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::check(&[
            Field::new("email", self.email, EMAIL_RULES),
            Field::new("username", self.username, USERNAME_RULES),
            Field::new("password", self.password, PASSWORD_RULES),
            Field::new("first_name", self.first_name, NAME_RULES),
            Field::new("last_name", self.last_name, NAME_RULES),
        ])
    }
}

/// Fields of a `Login` call.
///
/// `login` may be an email address or a username. A well-formed address is
/// accepted as is; anything else is held to the username rules, which also
/// admit usernames that contain `@`.
pub struct LoginInput<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

impl LoginInput<'_> {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let login_rules = if Rule::Email.holds(self.login) {
            EMAIL_RULES
        } else {
            USERNAME_RULES
        };
        Validator::check(&[
            Field::new("email", self.login, login_rules),
            Field::new("password", self.password, PASSWORD_RULES),
        ])
    }
}
