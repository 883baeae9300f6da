use crate::types::Transcript;

/// Render seconds as `MM:SS`, switching to `HH:MM:SS` at one hour.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours == 0 {
        format!("{minutes:02}:{secs:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    }
}

/// Markdown document with one timestamped line per segment, the form the
/// processed-folder output uses.
pub fn to_markdown(title: &str, transcript: &Transcript) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Transcript: {title}\n\n"));
    if let Some(language) = &transcript.language {
        out.push_str(&format!("- Language: {language}\n"));
    }
    out.push_str(&format!(
        "- Duration: {}\n- Words: {}\n\n",
        format_timestamp(transcript.duration),
        transcript.word_count()
    ));

    for segment in &transcript.segments {
        out.push_str(&format!(
            "**[{}]** {}\n\n",
            format_timestamp(segment.start),
            segment.text.trim()
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    #[test]
    fn timestamp_formats() {
        let cases: &[(f64, &str)] = &[
            (0.0, "00:00"),
            (65.0, "01:05"),
            (659.6, "11:00"),
            (3599.0, "59:59"),
            (3661.0, "01:01:01"),
            (3661.5, "01:01:02"),
            (36000.0, "10:00:00"),
            (-5.0, "00:00"),
        ];

        for (seconds, expected) in cases {
            assert_eq!(
                format_timestamp(*seconds),
                *expected,
                "failed for {seconds}"
            );
        }
    }

    #[test]
    fn markdown_has_timestamped_lines() {
        let transcript = Transcript {
            text: "hello world".to_string(),
            segments: vec![
                Segment::new(0.0, 2.0, " hello"),
                Segment::new(610.0, 612.0, "world"),
            ],
            language: Some("en".to_string()),
            duration: 612.0,
        };

        let md = to_markdown("standup.mp3", &transcript);

        assert!(md.starts_with("# Transcript: standup.mp3"));
        assert!(md.contains("- Language: en"));
        assert!(md.contains("**[00:00]** hello"));
        assert!(md.contains("**[10:10]** world"));
    }

    #[test]
    fn markdown_without_language_omits_line() {
        let transcript = Transcript {
            duration: 10.0,
            ..Default::default()
        };
        let md = to_markdown("x.wav", &transcript);
        assert!(!md.contains("Language"));
    }
}
