use crate::models::ContentKind;

pub const IMAGE_ANALYSIS: &str = include_str!("../data/prompts/image_analysis.txt");
pub const TEXT_ANALYSIS: &str = include_str!("../data/prompts/text_analysis.txt");

/// Keys the image prompt asks for, discriminant last.
pub const IMAGE_KEYS: [&str; 7] = [
    "colorContrast",
    "visualComplexity",
    "patternDensity",
    "sensoryLoad",
    "textLegibility",
    "recommendations",
    "overallSuitability",
];

/// Keys the text prompt asks for, discriminant last.
pub const TEXT_KEYS: [&str; 6] = [
    "readability",
    "clarity",
    "potentialForMisinterpretation",
    "structure",
    "recommendations",
    "overallAssessment",
];

/// Field whose presence marks a reply as the structured variant for `kind`.
pub fn discriminant(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Image => "overallSuitability",
        ContentKind::Text => "overallAssessment",
    }
}

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}
