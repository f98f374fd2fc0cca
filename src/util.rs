use reqwest::Url;

/// Render a human-friendly transfer speed string.
#[must_use]
pub fn format_speed(bytes_per_sec: f32) -> String {
    const KIB: f32 = 1024.0;
    const MIB: f32 = KIB * 1024.0;

    if bytes_per_sec < KIB {
        format!("{bytes_per_sec:.0} B/s")
    } else if bytes_per_sec < MIB {
        format!("{:.1} KB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.1} MB/s", bytes_per_sec / MIB)
    }
}

/// Render a byte count with a binary unit.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < MIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / MIB)
    }
}

/// Last path segment of a URL, ignoring query string and fragment.
#[must_use]
pub fn url_file_name(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
    };
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
}

/// File extension (without the dot) of the URL's last path segment.
#[must_use]
pub fn url_extension(url: &str) -> Option<String> {
    let name = url_file_name(url)?;
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_speed_human_readable() {
        assert_eq!(format_speed(512.0), "512 B/s");
        assert_eq!(format_speed(2_048.0), "2.0 KB/s");
        assert_eq!(format_speed(5_242_880.0), "5.0 MB/s");
    }

    #[test]
    fn formats_size_human_readable() {
        assert_eq!(format_size(800), "800 B");
        assert_eq!(format_size(1_536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn extracts_extension_from_url_path() {
        assert_eq!(
            url_extension("https://code.jquery.com/jquery-3.6.4.min.js"),
            Some("js".into())
        );
        assert_eq!(
            url_extension("https://example.test/b.zip?token=1#frag"),
            Some("zip".into())
        );
        assert_eq!(
            url_extension("https://restcountries.com/v3.1/all?fields=name,currencies"),
            None
        );
        assert_eq!(url_extension("https://example.test/"), None);
    }

    #[test]
    fn extracts_file_name_from_url_path() {
        assert_eq!(
            url_file_name("https://example.test/pkg/bundle.tar.gz"),
            Some("bundle.tar.gz".into())
        );
        assert_eq!(url_file_name("https://example.test"), None);
    }
}
