// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request payloads sent to the provider auth endpoints.

use serde::Serialize;
use validator::Validate;

use super::Address;

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body of `POST /signup`.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone_number: String,
}

/// Fields accepted by `PUT /update-profile`. Absent or empty fields are not sent.
#[derive(Debug, Clone, Default, Validate)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
}

impl ProfileUpdate {
    /// Copy with blank text fields turned into `None`.
    ///
    /// Profile forms submit every field; a blank one means "unchanged".
    pub fn normalized(&self) -> Self {
        fn present(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            name: present(&self.name),
            email: present(&self.email),
            // Passwords are sent as typed, only an empty one is dropped
            password: self.password.clone().filter(|p| !p.is_empty()),
            phone_number: present(&self.phone_number),
            address: self.address.clone(),
        }
    }

    /// Text form fields in wire order, skipping anything empty.
    pub fn form_fields(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        let mut fields = Vec::new();
        let text = [
            ("name", &self.name),
            ("email", &self.email),
            ("password", &self.password),
            ("phoneNumber", &self.phone_number),
        ];
        for (key, value) in text {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                fields.push((key, value.to_string()));
            }
        }
        if let Some(address) = &self.address {
            fields.push(("address", serde_json::to_string(address)?));
        }
        Ok(fields)
    }
}

/// Logo image attached to a profile update.
#[derive(Debug, Clone)]
pub struct LogoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
