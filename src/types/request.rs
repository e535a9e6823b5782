//! Generation request parsing and validation.
//!
//! A request arrives as loosely-typed JSON. Every field is checked here,
//! before the pipeline touches the filesystem or the model.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GenerationDefaults;
use crate::error::{Result, ServerError};

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 500;

/// Accepted guidance scale range.
pub const GUIDANCE_RANGE: RangeInclusive<f64> = 1.0..=50.0;

/// Accepted inference step range.
pub const STEPS_RANGE: RangeInclusive<i64> = 16..=128;

/// Accepted frame sizes.
pub const FRAME_SIZES: [i64; 4] = [64, 128, 256, 512];

/// A generation request as received from a client.
///
/// Fields are kept as raw JSON values so that type errors surface as
/// validation errors with a field-specific message. A `null` field is
/// treated the same as an omitted one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: Option<Value>,
    pub guidance_scale: Option<Value>,
    pub steps: Option<Value>,
    pub frame_size: Option<Value>,
}

/// Parameters that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub prompt: String,
    pub guidance_scale: f64,
    pub steps: u32,
    pub frame_size: u32,
}

impl GenerationRequest {
    /// Builds a request from typed values, as the CLI does.
    pub fn from_parts(
        prompt: &str,
        guidance_scale: Option<f64>,
        steps: Option<i64>,
        frame_size: Option<i64>,
    ) -> Self {
        Self {
            prompt: Some(Value::from(prompt)),
            guidance_scale: guidance_scale.map(Value::from),
            steps: steps.map(Value::from),
            frame_size: frame_size.map(Value::from),
        }
    }

    /// Substitutes defaults for omitted fields and validates every field.
    pub fn validate(&self, defaults: &GenerationDefaults) -> Result<GenerationParams> {
        let prompt = match &self.prompt {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(ServerError::missing_prompt()),
        };
        let prompt_len = prompt.chars().count();
        if prompt_len > MAX_PROMPT_CHARS {
            return Err(ServerError::prompt_too_long(prompt_len));
        }

        let guidance_scale = match &self.guidance_scale {
            None => defaults.guidance_scale,
            Some(v) => v.as_f64().ok_or_else(ServerError::invalid_guidance_scale)?,
        };
        if !GUIDANCE_RANGE.contains(&guidance_scale) {
            return Err(ServerError::invalid_guidance_scale());
        }

        let steps = match &self.steps {
            None => defaults.steps,
            Some(v) => as_integer(v).ok_or_else(ServerError::invalid_steps)?,
        };
        if !STEPS_RANGE.contains(&steps) {
            return Err(ServerError::invalid_steps());
        }

        let frame_size = match &self.frame_size {
            None => defaults.frame_size,
            Some(v) => as_integer(v).ok_or_else(ServerError::invalid_frame_size)?,
        };
        if !FRAME_SIZES.contains(&frame_size) {
            return Err(ServerError::invalid_frame_size());
        }

        Ok(GenerationParams {
            prompt,
            guidance_scale,
            steps: steps as u32,
            frame_size: frame_size as u32,
        })
    }
}

/// Reads a JSON number as an integer; `64.0` counts, `64.5` does not.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f.is_finite() {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn parse(body: Value) -> Result<GenerationParams> {
        let request: GenerationRequest = serde_json::from_value(body).unwrap();
        request.validate(&GenerationDefaults::default())
    }

    fn code_of(body: Value) -> ErrorCode {
        parse(body).unwrap_err().code
    }

    #[test]
    fn defaults_fill_omitted_fields() {
        let params = parse(json!({ "prompt": "a red chair" })).unwrap();
        assert_eq!(params.prompt, "a red chair");
        assert_eq!(params.guidance_scale, 15.0);
        assert_eq!(params.steps, 64);
        assert_eq!(params.frame_size, 256);
    }

    #[test]
    fn null_fields_count_as_omitted() {
        let params = parse(json!({ "prompt": "cube", "steps": null })).unwrap();
        assert_eq!(params.steps, 64);
    }

    #[test]
    fn explicit_fields_are_used() {
        let params = parse(json!({
            "prompt": "a shark",
            "guidanceScale": 1.0,
            "steps": 128,
            "frameSize": 64
        }))
        .unwrap();
        assert_eq!(params.guidance_scale, 1.0);
        assert_eq!(params.steps, 128);
        assert_eq!(params.frame_size, 64);
    }

    #[test]
    fn prompt_missing_empty_or_wrong_type() {
        assert_eq!(code_of(json!({})), ErrorCode::InvalidPrompt);
        assert_eq!(code_of(json!({ "prompt": "" })), ErrorCode::InvalidPrompt);
        assert_eq!(code_of(json!({ "prompt": 42 })), ErrorCode::InvalidPrompt);
        assert_eq!(code_of(json!({ "prompt": ["a"] })), ErrorCode::InvalidPrompt);
    }

    #[test]
    fn prompt_length_is_counted_in_characters() {
        let max = "é".repeat(MAX_PROMPT_CHARS);
        assert!(parse(json!({ "prompt": max })).is_ok());

        let long = "a".repeat(MAX_PROMPT_CHARS + 1);
        let err = parse(json!({ "prompt": long })).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPrompt);
        assert!(err.message.contains("501"));
    }

    #[test]
    fn guidance_scale_bounds() {
        assert!(parse(json!({ "prompt": "x", "guidanceScale": 50.0 })).is_ok());
        assert_eq!(
            code_of(json!({ "prompt": "x", "guidanceScale": 0.99 })),
            ErrorCode::InvalidGuidanceScale
        );
        assert_eq!(
            code_of(json!({ "prompt": "x", "guidanceScale": 50.01 })),
            ErrorCode::InvalidGuidanceScale
        );
        assert_eq!(
            code_of(json!({ "prompt": "x", "guidanceScale": "high" })),
            ErrorCode::InvalidGuidanceScale
        );
    }

    #[test]
    fn steps_bounds_and_integrality() {
        assert!(parse(json!({ "prompt": "x", "steps": 16 })).is_ok());
        assert!(parse(json!({ "prompt": "x", "steps": 32.0 })).is_ok());
        assert_eq!(code_of(json!({ "prompt": "x", "steps": 15 })), ErrorCode::InvalidSteps);
        assert_eq!(code_of(json!({ "prompt": "x", "steps": 129 })), ErrorCode::InvalidSteps);
        assert_eq!(code_of(json!({ "prompt": "x", "steps": 32.5 })), ErrorCode::InvalidSteps);
        assert_eq!(code_of(json!({ "prompt": "x", "steps": -64 })), ErrorCode::InvalidSteps);
    }

    #[test]
    fn frame_size_must_be_listed() {
        for size in FRAME_SIZES {
            assert!(parse(json!({ "prompt": "x", "frameSize": size })).is_ok());
        }
        for size in [0, 32, 100, 1024] {
            assert_eq!(
                code_of(json!({ "prompt": "x", "frameSize": size })),
                ErrorCode::InvalidFrameSize
            );
        }
    }

    #[test]
    fn prompt_is_checked_before_parameters() {
        assert_eq!(
            code_of(json!({ "prompt": "", "steps": 1 })),
            ErrorCode::InvalidPrompt
        );
    }

    #[test]
    fn from_parts_round_trips_through_validation() {
        let request = GenerationRequest::from_parts("lamp", Some(20.0), None, Some(128));
        let params = request.validate(&GenerationDefaults::default()).unwrap();
        assert_eq!(params.guidance_scale, 20.0);
        assert_eq!(params.steps, 64);
        assert_eq!(params.frame_size, 128);
    }
}
