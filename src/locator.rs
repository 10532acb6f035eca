use chrono::{Datelike, Days, NaiveDate};

/// One dated, not-yet-confirmed bulletin identified purely from the
/// predictable URL pattern. Confirmed (or not) by a `DocumentSource` probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub date: NaiveDate,
    pub url: String,
}

/// Derive the bulletin URL for one calendar date. The year component comes
/// from the probed date itself, so windows spanning a December→January
/// boundary resolve each date against its own year.
pub fn bulletin_url(base_url: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}/ru-{}.pdf",
        base_url.trim_end_matches('/'),
        date.year(),
        date.format("%Y-%m-%d"),
    )
}

/// Candidates for `lookback_days` consecutive days walking backward from
/// `start_date` (start, start−1, …).
pub fn candidates(base_url: &str, start_date: NaiveDate, lookback_days: u32) -> Vec<Candidate> {
    (0..lookback_days)
        .filter_map(|delta| start_date.checked_sub_days(Days::new(delta as u64)))
        .map(|date| Candidate {
            date,
            url: bulletin_url(base_url, date),
        })
        .collect()
}

/// Cache filename for a bulletin URL: the last path segment, with `.pdf`
/// appended when the segment doesn't already carry it.
pub fn cache_filename(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or(url);
    if segment.to_lowercase().ends_with(".pdf") {
        segment.to_string()
    } else {
        format!("{}.pdf", segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn url_format() {
        let url = bulletin_url("https://ru.muenchen.de/pdf", date(2024, 3, 8));
        assert_eq!(url, "https://ru.muenchen.de/pdf/2024/ru-2024-03-08.pdf");
    }

    #[test]
    fn url_trailing_slash() {
        let url = bulletin_url("https://ru.muenchen.de/pdf/", date(2024, 3, 8));
        assert_eq!(url, "https://ru.muenchen.de/pdf/2024/ru-2024-03-08.pdf");
    }

    #[test]
    fn window_walks_backward() {
        let c = candidates("https://x.test", date(2024, 3, 10), 3);
        let dates: Vec<NaiveDate> = c.iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 3, 10), date(2024, 3, 9), date(2024, 3, 8)]
        );
    }

    #[test]
    fn window_crosses_year_boundary() {
        let c = candidates("https://x.test", date(2025, 1, 2), 5);
        assert_eq!(c.len(), 5);
        // 2025-01-02, 2025-01-01, then 2024 dates with the older year in the URL
        assert_eq!(c[1].url, "https://x.test/2025/ru-2025-01-01.pdf");
        assert_eq!(c[2].url, "https://x.test/2024/ru-2024-12-31.pdf");
        assert_eq!(c[4].url, "https://x.test/2024/ru-2024-12-29.pdf");
    }

    #[test]
    fn empty_window() {
        assert!(candidates("https://x.test", date(2024, 3, 10), 0).is_empty());
    }

    #[test]
    fn cache_filename_from_url() {
        assert_eq!(
            cache_filename("https://ru.muenchen.de/pdf/2024/ru-2024-03-08.pdf"),
            "ru-2024-03-08.pdf"
        );
        assert_eq!(cache_filename("https://host/dokument/4711"), "4711.pdf");
    }
}
