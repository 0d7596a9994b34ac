//! Certificate validation
//!
//! Validates the certificate store and the deployed certificate of each
//! site: existence, parseability and expiry.

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::{Config, SiteConfig};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Validate the certificate store and deployed certificates
pub async fn validate_certificates(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    match tokio::fs::metadata(&config.certificates_root).await {
        Ok(meta) if !meta.is_dir() => {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!(
                    "Certificates root {:?} exists but is not a directory",
                    config.certificates_root
                ),
            ));
        }
        Ok(_) => {}
        Err(_) => {
            result.add_warning(ValidationWarning::new(format!(
                "Certificates root {:?} does not exist yet; it will be created on first issuance",
                config.certificates_root
            )));
        }
    }

    let threshold = config.manager.limits.renewal_threshold_days;
    for site in &config.sites {
        check_site(site, threshold, &mut result).await;
    }

    result
}

async fn check_site(site: &SiteConfig, threshold_days: i64, result: &mut ValidationResult) {
    let cert_path = &site.location.certificate;
    if cert_path.as_os_str().is_empty() {
        result.add_warning(ValidationWarning::new(format!(
            "Site '{}' has no certificate location",
            site.url
        )));
        return;
    }

    if !Path::new(cert_path).exists() {
        // Not yet deployed: the first cycle will issue it
        result.add_warning(ValidationWarning::new(format!(
            "Site '{}' certificate not found: {:?}",
            site.url, cert_path
        )));
        return;
    }

    if !site.location.private_key.as_os_str().is_empty() && !site.location.private_key.exists() {
        result.add_error(ValidationError::new(
            ErrorCategory::Certificate,
            format!(
                "Site '{}' private key not found: {:?}",
                site.url, site.location.private_key
            ),
        ));
    }

    match load_days_left(cert_path).await {
        Ok(days) if days < 0 => {
            result.add_warning(ValidationWarning::new(format!(
                "Site '{}' certificate expired {} day(s) ago",
                site.url, -days
            )));
        }
        Ok(days) if days <= threshold_days => {
            result.add_warning(ValidationWarning::new(format!(
                "Site '{}' certificate expires in {} day(s)",
                site.url, days
            )));
        }
        Ok(_) => {}
        Err(e) => result.add_error(e),
    }
}

/// Whole days until the certificate at `cert_path` expires
async fn load_days_left(cert_path: &Path) -> Result<i64, ValidationError> {
    let cert_pem = tokio::fs::read(cert_path).await.map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("Failed to read certificate {:?}: {}", cert_path, e),
        )
    })?;

    let pem = pem::parse(&cert_pem).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("Failed to parse certificate {:?}: {}", cert_path, e),
        )
    })?;

    let (_, cert) = x509_parser::parse_x509_certificate(pem.contents()).map_err(|e| {
        ValidationError::new(
            ErrorCategory::Certificate,
            format!("Invalid X509 certificate {:?}: {}", cert_path, e),
        )
    })?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    let not_after = cert.validity().not_after.timestamp();

    Ok((not_after - now).div_euclid(86_400))
}
