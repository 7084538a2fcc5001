// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider profile model, validated at the API boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Admin-controlled approval gate on a provider account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Notice shown when an unapproved provider is turned away.
    pub fn denial_message(&self) -> &'static str {
        match self {
            ApprovalStatus::Rejected => "Admin rejected your approval request.",
            _ => "Please wait for admin approval.",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(ProfileError::UnknownStatus(other.to_string())),
        }
    }
}

/// Postal address attached to a provider profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
}

/// A provider profile that passed validation.
///
/// Deserializing goes through [`RawProvider`], so every `Provider` in the
/// process has a non-empty id, an email, and a known approval status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawProvider")]
pub struct Provider {
    /// Server-assigned provider id
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Logo URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_logo: Option<String>,
    #[serde(rename = "authorizationStatus")]
    pub approval_status: ApprovalStatus,
}

impl Provider {
    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }
}

/// Untrusted profile payload as it arrives over the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProvider {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    provider_logo: Option<String>,
    #[serde(default)]
    authorization_status: Option<String>,
}

impl TryFrom<RawProvider> for Provider {
    type Error = ProfileError;

    fn try_from(raw: RawProvider) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ProfileError::MissingField("_id"))?;
        let email = raw
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or(ProfileError::MissingField("email"))?;

        // A profile without a status has not been reviewed yet
        let approval_status = match raw.authorization_status.as_deref() {
            None | Some("") => ApprovalStatus::Pending,
            Some(status) => status.parse()?,
        };

        Ok(Provider {
            id,
            name: raw.name.unwrap_or_default(),
            email,
            phone_number: raw.phone_number,
            address: raw.address,
            provider_logo: raw.provider_logo,
            approval_status,
        })
    }
}

/// Profile schema violations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown approval status `{0}`")]
    UnknownStatus(String),
}
