//! Prompts and fixed request parameters for metadata extraction.
//!
//! Callers can override the system prompt and model via
//! [`crate::config::ShapeConfig`]; the user prompt template is fixed.

/// Default model written into every request body.
pub const DEFAULT_MODEL: &str = "glm-4-flash";

/// Sampling temperature sent with every request. The batch API accepts it as
/// a string, and existing result pipelines expect exactly this value.
pub const TEMPERATURE: &str = "0.1";

/// Author placeholder used when a record carries no author string.
pub const MISSING_AUTHORS: &str = "N/A";

/// Default system prompt for abstract analysis.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert assistant specialized in analyzing academic paper abstracts and extracting key information accurately and concisely.";

/// The answer schema the model is asked to fill in.
pub const OUTPUT_FORMAT_INSTRUCTIONS: &str = r#"Output the result as a single JSON object in this exact format:
{
    "problemStatement": "(string | null) Concise description of the core research problem addressed (1-2 sentences).",
    "methodology": "(string | null) Brief summary of the key method, technique, or approach proposed/used (1-2 short phrases or sentences).",
    "codeLink": "(string | null) URL to the source code repository (e.g., GitHub), if mentioned explicitly in the abstract. Otherwise, null.",
    "benchmark": "(string | null) Name of the specific benchmark dataset or evaluation task used, if mentioned (e.g., "C-MAPSS dataset", "ImageNet"). Otherwise, null.",
    "dataset": "(string | null) Name of the primary dataset(s) used, if mentioned and different from the benchmark (e.g., "NASA turbofan engine degradation simulation data"). Otherwise, null.",
    "results": "(string | null) Key quantitative results or main findings reported (e.g., "cost rate lower than preventive maintenance", "computationally efficient framework using Gaussian processes"). Otherwise, null.",
    "keywords": ["Keyword 1", "Keyword 2", ...] // List of keywords extracted from the abstract, if available, e.g. ["Image Generation", "Depth Estimation", "Text to Speech", "3D Face Animation"]. Otherwise, an empty list.
}

Use null if information for a key cannot be clearly determined from the provided text. Do not add any explanations before or after the JSON object."#;

/// Render the user message for one paper.
///
/// `abstract_text` is expected to be trimmed already; `authors` is used
/// verbatim (pass [`MISSING_AUTHORS`] when unknown).
pub fn user_prompt(title: &str, authors: &str, abstract_text: &str) -> String {
    format!(
        "## Task: Analyze the following academic paper metadata and extract the specified information based SOLELY on the provided Title and Abstract.\n\
\n\
## Input Metadata:\n\
Title: {title}\n\
Authors: {authors}\n\
Abstract: {abstract_text}\n\
\n\
## Extraction Fields and Output Format:\n\
{OUTPUT_FORMAT_INSTRUCTIONS}\n\
\n\
## Extracted JSON:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_interpolates_fields() {
        let p = user_prompt("Attention Is All You Need", "Vaswani et al.", "We propose the Transformer.");
        assert!(p.starts_with("## Task: Analyze"));
        assert!(p.contains("Title: Attention Is All You Need\n"));
        assert!(p.contains("Authors: Vaswani et al.\n"));
        assert!(p.contains("Abstract: We propose the Transformer.\n"));
        assert!(p.ends_with("## Extracted JSON:"));
    }

    #[test]
    fn user_prompt_embeds_schema() {
        let p = user_prompt("T", MISSING_AUTHORS, "A");
        for key in [
            "problemStatement",
            "methodology",
            "codeLink",
            "benchmark",
            "dataset",
            "results",
            "keywords",
        ] {
            assert!(p.contains(&format!("\"{key}\"")), "missing key {key}");
        }
        assert!(p.contains("Authors: N/A"));
    }

    #[test]
    fn user_prompt_keeps_braces_literal() {
        let p = user_prompt("{T}", "a", "b");
        assert!(p.contains("Title: {T}"));
    }
}
