//! Configuration validation with detailed error reporting.
//!
//! Goes beyond the structural checks done by the route factory: detects
//! shadowed routes, duplicate prefixes, and insecure setups, reporting
//! warnings that do not block startup.

use crate::models::settings::Settings;
use log::{info, warn};
use std::collections::HashMap;

/// Result of configuration validation containing errors and warnings.
///
/// # Examples
///
/// ```
/// use portico_rs::config::validation::ValidationResult;
///
/// let mut result = ValidationResult::new();
/// result.add_error("Missing required field".to_string());
/// result.add_warning("Using default value".to_string());
///
/// assert!(!result.is_valid);
/// assert_eq!(result.errors.len(), 1);
/// assert_eq!(result.warnings.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Critical errors that prevent configuration use
    pub errors: Vec<String>,
    /// Non-critical issues that should be addressed
    pub warnings: Vec<String>,
    /// Whether the configuration is valid (no errors)
    pub is_valid: bool,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    /// Adds a critical error and marks validation as failed.
    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    /// Adds a non-critical warning.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Configuration validator producing errors and advisory warnings.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Performs comprehensive validation of gateway settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use portico_rs::config::validation::ConfigValidator;
    /// use portico_rs::models::settings::Settings;
    ///
    /// let settings: Settings = serde_json::from_str(
    ///     r#"{"version": 1, "routes": []}"#,
    /// ).unwrap();
    /// let result = ConfigValidator::validate_comprehensive(&settings);
    /// assert!(result.is_valid);
    /// assert!(!result.warnings.is_empty()); // empty route set is flagged
    /// ```
    pub fn validate_comprehensive(settings: &Settings) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_structure(settings, &mut result);
        Self::validate_route_conflicts(settings, &mut result);
        Self::validate_security(settings, &mut result);
        Self::log_results(&result);

        result
    }

    fn validate_structure(settings: &Settings, result: &mut ValidationResult) {
        if let Err(error) = settings.gateway.validate() {
            result.add_error(error.to_string());
        }

        if settings.routes.is_empty() {
            result.add_warning(
                "No routes configured - the gateway will answer 404 for all requests".to_string(),
            );
        }

        if let Err(error) = settings.build_routes() {
            result.add_error(error.to_string());
        }
    }

    fn validate_route_conflicts(settings: &Settings, result: &mut ValidationResult) {
        let mut by_prefix: HashMap<(&str, u32), &str> = HashMap::new();

        for definition in &settings.routes {
            let key = (definition.route_prefix.as_str(), definition.priority);
            if let Some(other) = by_prefix.insert(key, definition.route_id.as_str()) {
                result.add_warning(format!(
                    "Routes {:?} and {:?} share prefix {:?} at priority {} - matching order \
                     between them is by route id only",
                    other, definition.route_id, definition.route_prefix, definition.priority
                ));
            }
        }

        // A broader prefix with a lower priority makes narrower ones unreachable.
        for definition in &settings.routes {
            for other in &settings.routes {
                if definition.route_id != other.route_id
                    && other.priority < definition.priority
                    && definition.route_prefix.starts_with(&other.route_prefix)
                {
                    result.add_warning(format!(
                        "Route {:?} ({:?}) is shadowed by {:?} ({:?}) at lower priority {}",
                        definition.route_id,
                        definition.route_prefix,
                        other.route_id,
                        other.route_prefix,
                        other.priority
                    ));
                }
            }
        }
    }

    fn validate_security(settings: &Settings, result: &mut ValidationResult) {
        for definition in &settings.routes {
            for destination in &definition.destinations {
                if destination.starts_with("http://")
                    && !destination.contains("localhost")
                    && !destination.contains("127.0.0.1")
                {
                    result.add_warning(format!(
                        "Insecure HTTP destination {:?} on route {:?} - consider HTTPS",
                        destination, definition.route_id
                    ));
                }
            }

            if definition.requires_authentication
                && definition
                    .allowed_roles
                    .as_ref()
                    .is_some_and(|roles| roles.is_empty())
            {
                result.add_warning(format!(
                    "Route {:?} requires authentication but allows no roles - it will be \
                     unreachable once the caller enforces roles",
                    definition.route_id
                ));
            }
        }
    }

    fn log_results(result: &ValidationResult) {
        for warning in &result.warnings {
            warn!("config validation: {warning}");
        }
        if result.is_valid {
            info!(
                "configuration validated with {} warnings",
                result.warnings.len()
            );
        }
    }
}
