// Sample prompts offered while the transcript is still empty.

pub const SAMPLE_PROMPTS: &[&str] = &[
    "Explain the concept of neo-minimalism in design",
    "Write a short poem about digital aesthetics",
    "Compare monochromatic and duotone color schemes",
    "Suggest ways to declutter my digital workspace",
];

/// Fixed list of prompt labels supplied by the presentation layer.
#[derive(Clone, Copy, Debug)]
pub struct PromptCatalog {
    entries: &'static [&'static str],
}

impl PromptCatalog {
    pub const fn new(entries: &'static [&'static str]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [&'static str] {
        self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&'static str> {
        self.entries.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::new(SAMPLE_PROMPTS)
    }
}
