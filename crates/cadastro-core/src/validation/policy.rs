//! Age-based CPF requirement.
//!
//! | age (months) | CPF present | CPF absent, justified | CPF absent, no justification |
//! |--------------|-------------|-----------------------|------------------------------|
//! | < 6          | Allowed     | RequiresJustification | Blocked                      |
//! | >= 6         | Allowed     | Blocked               | Blocked                      |

use chrono::NaiveDate;
use tracing::debug;

use crate::config::{AgeMonthRule, ValidationConfig};
use crate::documents::Cpf;
use crate::models::PolicyResult;

use super::age::age_in_months;

pub const REASON_JUSTIFICATION_REQUIRED: &str = "justification required";
pub const REASON_CPF_REQUIRED: &str = "cpf required";
pub const REASON_CPF_DEFERRED: &str = "cpf absent for newborn; justification recorded";

/// Document policy with configurable thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentPolicy {
    /// Age in months from which a CPF is mandatory
    pub cpf_required_from_months: u32,
    pub rule: AgeMonthRule,
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl DocumentPolicy {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            cpf_required_from_months: config.cpf_required_from_months,
            rule: config.age_month_rule,
        }
    }

    /// Evaluate the policy for a birth date at `now`.
    ///
    /// A blank justification counts as absent.
    pub fn evaluate(
        &self,
        birth_date: NaiveDate,
        cpf: Option<&Cpf>,
        justification: Option<&str>,
        now: NaiveDate,
    ) -> PolicyResult {
        let age_months = age_in_months(birth_date, now, self.rule);
        let justification = justification.map(str::trim).filter(|j| !j.is_empty());

        let result = match (cpf, justification) {
            (Some(_), _) => PolicyResult::Allowed,
            (None, _) if age_months >= i64::from(self.cpf_required_from_months) => {
                PolicyResult::Blocked {
                    reason: REASON_CPF_REQUIRED.into(),
                }
            }
            (None, Some(_)) => PolicyResult::RequiresJustification {
                reason: REASON_CPF_DEFERRED.into(),
            },
            (None, None) => PolicyResult::Blocked {
                reason: REASON_JUSTIFICATION_REQUIRED.into(),
            },
        };

        debug!(age_months, ?result, "document policy evaluated");
        result
    }

    /// Policy for a record with no birth date: the CPF is always required.
    pub fn evaluate_without_birth_date(&self, cpf: Option<&Cpf>) -> PolicyResult {
        match cpf {
            Some(_) => PolicyResult::Allowed,
            None => PolicyResult::Blocked {
                reason: REASON_CPF_REQUIRED.into(),
            },
        }
    }
}

/// Evaluate the document policy with default thresholds.
pub fn evaluate_document_policy(
    birth_date: NaiveDate,
    cpf: Option<&Cpf>,
    justification: Option<&str>,
    now: NaiveDate,
) -> PolicyResult {
    DocumentPolicy::default().evaluate(birth_date, cpf, justification, now)
}
