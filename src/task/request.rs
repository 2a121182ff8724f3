//! Resize requests: wire shape, validation, and per-image color resolution.
//!
//! [`ResizeRequest`] mirrors the JSON body of `POST /api/resize` field for
//! field, with loose types (`i64`, `String`) so that out-of-range values and
//! unknown modes surface as validation errors rather than parse errors.
//! [`ResizeRequest::validate`] turns it into a [`ValidatedRequest`] or fails
//! before any task exists.

use super::TaskError;
use crate::imaging::{HexColor, MAX_DIMENSION, ResizeMode, ResizeParams};
use crate::store::FileId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

fn default_mode() -> String {
    ResizeMode::Fit.as_str().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeRequest {
    pub file_ids: Vec<FileId>,
    pub width: i64,
    pub height: i64,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Fallback background for Fill mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    /// Per-image backgrounds for Fill mode; take precedence over `fill_color`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_colors: Option<HashMap<FileId, String>>,
}

impl ResizeRequest {
    pub fn new(file_ids: Vec<FileId>, width: u32, height: u32, mode: ResizeMode) -> Self {
        Self {
            file_ids,
            width: width as i64,
            height: height as i64,
            mode: mode.as_str().to_string(),
            fill_color: None,
            fill_colors: None,
        }
    }

    pub fn with_fill_color(mut self, color: impl Into<String>) -> Self {
        self.fill_color = Some(color.into());
        self
    }

    pub fn with_fill_colors(mut self, colors: HashMap<FileId, String>) -> Self {
        self.fill_colors = Some(colors);
        self
    }

    /// Check every field without touching the image store.
    ///
    /// Colors are only parsed in Fill mode, and a mapping entry is only
    /// parsed if its id is part of the request.
    pub fn validate(&self) -> Result<ValidatedRequest, TaskError> {
        if self.file_ids.is_empty() {
            return Err(TaskError::Validation("no file ids provided".into()));
        }

        let mut seen = HashSet::with_capacity(self.file_ids.len());
        if let Some(dup) = self.file_ids.iter().find(|id| !seen.insert(*id)) {
            return Err(TaskError::Validation(format!("duplicate file id '{dup}'")));
        }

        let width = check_dimension("width", self.width)?;
        let height = check_dimension("height", self.height)?;
        let mode: ResizeMode = self.mode.parse().map_err(TaskError::Validation)?;

        let (fallback, overrides) = if mode == ResizeMode::Fill {
            let fallback = self.fill_color.as_deref().map(parse_color).transpose()?;
            let mut overrides = HashMap::new();
            for (id, color) in self.fill_colors.iter().flatten() {
                if seen.contains(id) {
                    overrides.insert(id.clone(), parse_color(color)?);
                }
            }
            (fallback, overrides)
        } else {
            (None, HashMap::new())
        };

        Ok(ValidatedRequest {
            file_ids: self.file_ids.clone(),
            width,
            height,
            mode,
            fallback,
            overrides,
        })
    }
}

fn check_dimension(name: &str, value: i64) -> Result<u32, TaskError> {
    if (1..=MAX_DIMENSION as i64).contains(&value) {
        Ok(value as u32)
    } else {
        Err(TaskError::Validation(format!(
            "{name} must be between 1 and {MAX_DIMENSION}, got {value}"
        )))
    }
}

fn parse_color(s: &str) -> Result<HexColor, TaskError> {
    s.parse().map_err(TaskError::Validation)
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub file_ids: Vec<FileId>,
    pub width: u32,
    pub height: u32,
    pub mode: ResizeMode,
    pub fallback: Option<HexColor>,
    pub overrides: HashMap<FileId, HexColor>,
}

impl ValidatedRequest {
    /// The effective fill color for one image: mapping entry, then fallback,
    /// then white. `None` outside Fill mode.
    pub fn fill_color_for(&self, id: &FileId) -> Option<HexColor> {
        if self.mode != ResizeMode::Fill {
            return None;
        }
        Some(
            self.overrides
                .get(id)
                .copied()
                .or(self.fallback)
                .unwrap_or(HexColor::WHITE),
        )
    }

    /// Fully resolved parameters for one image.
    pub fn params_for(&self, id: &FileId) -> ResizeParams {
        ResizeParams {
            width: self.width,
            height: self.height,
            mode: self.mode,
            fill_color: self.fill_color_for(id),
        }
    }
}
