//! Vision prompts
//!
//! Both templates ask for the same fixed layout so the client can render
//! either answer the same way.

const RESPONSE_LAYOUT: &str = "**Disease Detected:** [disease name or \"Healthy\"]
**Confidence:** [High/Medium/Low]
**Severity:** [Critical/High/Moderate/Low/None]

**Symptoms Observed:**
- [List visible symptoms]

**Treatment Recommendations:**

**Organic Methods:**
- [List organic treatment options]

**Chemical Methods:**
- [List chemical treatment options with dosage]

**Preventive Measures:**
- [List preventive actions]

If the plant appears healthy, state that clearly and provide general care tips.";

/// Prompt for a known crop
pub fn crop_prompt(crop: &str) -> String {
    format!(
        "Analyze this {crop} plant image and identify any diseases.\n\n\
         Provide a detailed response in the following format:\n\n\
         **Crop Identified:** [crop name]\n{RESPONSE_LAYOUT}"
    )
}

/// Prompt when the crop is unknown: identify the plant first
pub fn generic_prompt() -> String {
    format!(
        "Identify this plant and analyze it for any diseases.\n\n\
         Provide a detailed response in the following format:\n\n\
         **Plant Identified:** [plant/crop name]\n{RESPONSE_LAYOUT}"
    )
}

/// Pick the template for an optional crop hint
pub fn build_prompt(crop_hint: Option<&str>) -> String {
    match crop_hint.map(str::trim).filter(|c| !c.is_empty()) {
        Some(crop) => crop_prompt(crop),
        None => generic_prompt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_hint_selects_crop_prompt() {
        let prompt = build_prompt(Some("tomato"));
        assert!(prompt.contains("Analyze this tomato plant"));
        assert!(prompt.contains("**Crop Identified:**"));
    }

    #[test]
    fn test_no_hint_selects_generic_prompt() {
        for hint in [None, Some(""), Some("  ")] {
            let prompt = build_prompt(hint);
            assert!(prompt.contains("Identify this plant"));
            assert!(prompt.contains("**Plant Identified:**"));
        }
    }

    #[test]
    fn test_both_request_treatment_sections() {
        for prompt in [crop_prompt("potato"), generic_prompt()] {
            for section in ["**Severity:**", "**Organic Methods:**", "**Chemical Methods:**", "**Preventive Measures:**"] {
                assert!(prompt.contains(section), "missing {}", section);
            }
        }
    }
}
