use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Area, Store};

/// An issued client or CA certificate, as listed to operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub serial: String,
    pub common_name: String,
    #[serde(rename = "isCA")]
    pub is_ca: bool,
    #[serde(default)]
    pub usage: Vec<String>,
    #[serde(default)]
    pub revoked: bool,
    pub issued: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    #[serde(default)]
    pub fingerprints: BTreeMap<String, String>,
}

impl Store {
    pub fn certificates(&self) -> Vec<Certificate> {
        self.certificates.read().clone()
    }

    /// Replace the certificate list
    pub fn update_certificates(&self, certificates: Vec<Certificate>) {
        *self.certificates.write() = certificates;
        self.run_callbacks(Area::Certificates);
    }
}
