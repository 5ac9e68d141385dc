// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, registration and new-password forms.
//!
//! Every check here runs before any backend call; a rejected form never
//! reaches the auth service.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationErrors};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_COUNTRY_CODE: &str = "+351";

pub const PASSWORD_MISMATCH: &str = "As passwords não coincidem";
pub const PASSWORD_TOO_SHORT: &str = "A password deve ter pelo menos 6 caracteres";
pub const TERMS_REQUIRED: &str = "Deve aceitar os termos e condições";

/// Validation failure, shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FormError(pub String);

impl FormError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// First message reported by `validator`, preferring `fields` in order.
    pub fn from_validation(errors: &ValidationErrors, fields: &[&str]) -> Self {
        let by_field = errors.field_errors();
        let message = fields
            .iter()
            .filter_map(|field| by_field.get(*field))
            .chain(by_field.values())
            .flat_map(|errs| errs.iter())
            .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Dados inválidos".to_string());
        Self(message)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    #[validate(length(min = 1, message = "A password é obrigatória"))]
    pub password: String,
}

impl LoginForm {
    pub fn check(&self) -> Result<(), FormError> {
        self.validate()
            .map_err(|e| FormError::from_validation(&e, &["email", "password"]))
    }
}

fn default_country_code() -> String {
    DEFAULT_COUNTRY_CODE.to_string()
}

/// Sign-up form as submitted.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegistrationForm {
    #[validate(length(min = 1, max = 100, message = "O nome é obrigatório"))]
    pub name: String,
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    /// Local number; any non-digit characters are dropped
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub accept_terms: bool,
}

/// Registration that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Country code followed by digits, when a number was given
    pub phone: Option<String>,
}

impl RegistrationForm {
    pub fn check(&self) -> Result<ValidRegistration, FormError> {
        let trimmed = Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            ..self.clone()
        };
        trimmed
            .validate()
            .map_err(|e| FormError::from_validation(&e, &["name", "email"]))?;

        check_new_password(&self.password, &self.confirm_password)?;

        if !self.accept_terms {
            return Err(FormError::new(TERMS_REQUIRED));
        }

        Ok(ValidRegistration {
            name: trimmed.name,
            email: trimmed.email,
            password: self.password.clone(),
            phone: format_phone(&self.country_code, &self.phone),
        })
    }
}

/// New password plus confirmation, as submitted on the reset page.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl NewPasswordForm {
    pub fn check(&self) -> Result<(), FormError> {
        check_new_password(&self.password, &self.confirm_password)
    }
}

fn check_new_password(password: &str, confirmation: &str) -> Result<(), FormError> {
    if password != confirmation {
        return Err(FormError::new(PASSWORD_MISMATCH));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FormError::new(PASSWORD_TOO_SHORT));
    }
    Ok(())
}

/// Keep only digits and prefix the country code. Blank input means no phone.
pub fn format_phone(country_code: &str, raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let code = match country_code.trim() {
        "" => DEFAULT_COUNTRY_CODE,
        code => code,
    };
    Some(format!("{}{}", code, digits))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum PasswordStrength {
    Fraca,
    #[serde(rename = "Média")]
    Media,
    Forte,
}

impl PasswordStrength {
    pub fn label(&self) -> &'static str {
        match self {
            PasswordStrength::Fraca => "Fraca",
            PasswordStrength::Media => "Média",
            PasswordStrength::Forte => "Forte",
        }
    }
}

/// Strength hint shown while typing; `None` for an empty password.
pub fn password_strength(password: &str) -> Option<PasswordStrength> {
    let len = password.chars().count();
    if len == 0 {
        return None;
    }
    if len < MIN_PASSWORD_LEN {
        return Some(PasswordStrength::Fraca);
    }
    if len < 8 {
        return Some(PasswordStrength::Media);
    }

    let has_upper = password.chars().any(char::is_uppercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_upper && has_digit {
        Some(PasswordStrength::Forte)
    } else {
        Some(PasswordStrength::Media)
    }
}
