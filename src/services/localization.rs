use crate::api::middleware::AppError;
use crate::config::LocalizationConfig;

/// Locale set used to expand localized fields.
///
/// Built once at startup from configuration and handed to the schema
/// compiler; fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Localization {
    locales: Vec<String>,
    fallback_locale: String,
}

impl Localization {
    pub fn new(locales: Vec<String>, fallback_locale: impl Into<String>) -> Result<Self, AppError> {
        let fallback_locale = fallback_locale.into();
        let mut unique: Vec<String> = Vec::with_capacity(locales.len());

        for locale in locales {
            let locale = locale.trim().to_string();
            if locale.is_empty() {
                return Err(AppError::Config("Empty locale in localization.locales".to_string()));
            }
            if !unique.contains(&locale) {
                unique.push(locale);
            }
        }

        if unique.is_empty() {
            return Err(AppError::Config(
                "Localization is enabled but no locales are configured".to_string(),
            ));
        }

        if !unique.contains(&fallback_locale) {
            return Err(AppError::Config(format!(
                "Fallback locale {} is not one of the configured locales: {}",
                fallback_locale,
                unique.join(", ")
            )));
        }

        Ok(Self {
            locales: unique,
            fallback_locale,
        })
    }

    /// `None` when localization is disabled
    pub fn from_config(config: &LocalizationConfig) -> Result<Option<Self>, AppError> {
        if !config.enable {
            return Ok(None);
        }
        Self::new(config.locales.clone(), config.fallback_locale.clone()).map(Some)
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    /// Physical column names of a localized field, `<field>_<locale>` per locale
    pub fn column_names(&self, field: &str) -> Vec<String> {
        self.locales
            .iter()
            .map(|locale| format!("{}_{}", field, locale))
            .collect()
    }
}
