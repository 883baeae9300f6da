use ink_transcript::Segment;

/// `response_format=verbose_json` payload. Fields the pipeline does not
/// consume (tokens, temperatures, confidence) are ignored on parse.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct VerboseResponse {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub segments: Vec<VerboseSegment>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct VerboseSegment {
    #[serde(default)]
    pub id: i64,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl VerboseResponse {
    /// Timed segments, falling back to one whole-response segment when the
    /// provider omits the segment list (it does for very short clips).
    pub fn into_segments(self) -> Vec<Segment> {
        if self.segments.is_empty() {
            if self.text.trim().is_empty() {
                return Vec::new();
            }
            let end = self.duration.unwrap_or(0.0);
            return vec![Segment::new(0.0, end, self.text)];
        }

        self.segments
            .into_iter()
            .map(|s| Segment::new(s.start, s.end, s.text))
            .collect()
    }
}
