use crate::models::AgendaMapping;

/// Configuration for mapping validation
#[derive(Debug, Clone)]
pub struct MappingValidationConfig {
    /// Maximum number of lines two agenda ranges may share before the
    /// mapping is considered inconsistent. A few shared boundary lines are
    /// normal; large overlaps mean the model double-assigned a discussion.
    pub overlap_tolerance_lines: usize,
}

impl Default for MappingValidationConfig {
    fn default() -> Self {
        Self {
            overlap_tolerance_lines: 5,
        }
    }
}

/// Validation result for a mapping response
#[derive(Debug, Clone)]
pub struct MappingValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl MappingValidation {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

/// Validate structural consistency of a mapping: every range well-formed,
/// and no two ranges overlapping beyond the tolerance.
pub fn validate_mapping(
    mappings: &[AgendaMapping],
    config: &MappingValidationConfig,
) -> MappingValidation {
    let mut errors = Vec::new();

    for mapping in mappings {
        if mapping.line_start == 0 {
            errors.push(format!(
                "\"{}\": line_start must be 1-indexed, got 0",
                truncated_title(mapping)
            ));
        }
        if mapping.line_start > mapping.line_end {
            errors.push(format!(
                "\"{}\": inverted range {}-{}",
                truncated_title(mapping),
                mapping.line_start,
                mapping.line_end
            ));
        }
    }

    for i in 0..mappings.len() {
        for j in (i + 1)..mappings.len() {
            let a = &mappings[i];
            let b = &mappings[j];

            let overlap_start = a.line_start.max(b.line_start);
            let overlap_end = a.line_end.min(b.line_end);
            let overlap = overlap_end.saturating_sub(overlap_start);

            if overlap > config.overlap_tolerance_lines {
                errors.push(format!(
                    "\"{}\" ({}-{}) overlaps \"{}\" ({}-{}) by {} lines",
                    truncated_title(a),
                    a.line_start,
                    a.line_end,
                    truncated_title(b),
                    b.line_start,
                    b.line_end,
                    overlap
                ));
            }
        }
    }

    if errors.is_empty() {
        MappingValidation::valid()
    } else {
        MappingValidation::invalid(errors)
    }
}

fn truncated_title(mapping: &AgendaMapping) -> String {
    mapping.agenda_title.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgendaType, STATUS_RECEIVED};

    fn mapping(title: &str, start: usize, end: usize) -> AgendaMapping {
        AgendaMapping {
            agenda_title: title.to_string(),
            agenda_type: AgendaType::Other,
            status: STATUS_RECEIVED.to_string(),
            line_start: start,
            line_end: end,
            speakers: vec![],
            attachments: vec![],
        }
    }

    #[test]
    fn test_disjoint_ranges_are_valid() {
        let mappings = vec![mapping("a", 1, 50), mapping("b", 51, 120), mapping("c", 121, 200)];
        let result = validate_mapping(&mappings, &MappingValidationConfig::default());
        assert!(result.is_valid);
    }

    #[test]
    fn test_overlap_within_tolerance_is_valid() {
        // Shares exactly 5 lines (95..100), at the default tolerance
        let mappings = vec![mapping("a", 1, 100), mapping("b", 95, 200)];
        let result = validate_mapping(&mappings, &MappingValidationConfig::default());
        assert!(result.is_valid);
    }

    #[test]
    fn test_overlap_beyond_tolerance_is_flagged() {
        let mappings = vec![mapping("a", 1, 100), mapping("b", 60, 200)];
        let result = validate_mapping(&mappings, &MappingValidationConfig::default());
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("overlaps"));
    }

    #[test]
    fn test_inverted_range_is_flagged() {
        let mappings = vec![mapping("a", 80, 20)];
        let result = validate_mapping(&mappings, &MappingValidationConfig::default());
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("inverted range"));
    }

    #[test]
    fn test_zero_line_start_is_flagged() {
        let mappings = vec![mapping("a", 0, 20)];
        let result = validate_mapping(&mappings, &MappingValidationConfig::default());
        assert!(!result.is_valid);
    }
}
