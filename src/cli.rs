use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "outreachbot")]
#[command(about = "Automated outreach pipeline: discover local businesses, scrape contacts, draft and send emails")]
#[command(version)]
pub struct Args {
    /// Create default configuration file at ./config/outreachbot.toml
    #[arg(long)]
    pub init: bool,

    /// City to search for businesses in (e.g. "Austin, TX")
    #[arg(short, long)]
    pub city: Option<String>,

    /// Business categories, comma-separated (e.g. "plumber,roofer")
    #[arg(short = 'g', long)]
    pub category: Option<String>,

    /// File with one website URL per line, bypassing discovery
    #[arg(long, value_name = "FILE", conflicts_with_all = ["city", "category"])]
    pub url_file: Option<String>,

    /// Maximum number of leads to process
    #[arg(short, long, default_value = "20")]
    pub max: usize,

    /// Draft emails without sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Fall back to headless Chrome for pages that fail all HTTP strategies
    #[arg(long)]
    pub use_browser: bool,

    /// Discover leads via the maps API instead of the search-results fallback
    #[arg(long)]
    pub use_maps: bool,

    /// Drop directory/aggregator sites (yelp, yellowpages, ...) from results
    #[arg(long)]
    pub filter_aggregators: bool,

    /// Print the N most recent runs from history and exit
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "5")]
    pub recall_history: Option<usize>,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Outreach log CSV path (overrides config)
    #[arg(long, value_name = "FILE")]
    pub log_path: Option<String>,

    /// Run history JSON path (overrides config)
    #[arg(long, value_name = "FILE")]
    pub history_path: Option<String>,
}

impl Args {
    /// Check if running from a URL file instead of discovery
    pub fn is_url_file_mode(&self) -> bool {
        self.url_file.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        // --init and --recall-history run without discovery input
        if self.init || self.recall_history.is_some() {
            return Ok(());
        }

        if !self.is_url_file_mode() {
            match (&self.city, &self.category) {
                (None, _) => {
                    return Err(
                        "City is required (use --city with --category, or --url-file)".to_string(),
                    )
                }
                (_, None) => {
                    return Err(
                        "Category is required (use --category with --city, or --url-file)"
                            .to_string(),
                    )
                }
                (Some(c), Some(g)) => {
                    if c.trim().is_empty() {
                        return Err("City cannot be empty".to_string());
                    }
                    if g.trim().is_empty() {
                        return Err("Category cannot be empty".to_string());
                    }
                }
            }
        }

        if self.max == 0 {
            return Err("Max leads must be greater than 0".to_string());
        }

        if self.max > 500 {
            return Err("Max leads cannot exceed 500 to avoid overwhelming target sites".to_string());
        }

        Ok(())
    }

    /// Categories split on commas, trimmed, empties dropped
    pub fn categories(&self) -> Vec<String> {
        self.category
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            init: false,
            city: Some("Austin, TX".to_string()),
            category: Some("plumber".to_string()),
            url_file: None,
            max: 20,
            dry_run: false,
            use_browser: false,
            use_maps: false,
            filter_aggregators: false,
            recall_history: None,
            verbose: 0,
            log_path: None,
            history_path: None,
        }
    }

    #[test]
    fn test_validate_accepts_city_and_category() {
        assert!(base_args().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_city() {
        let mut args = base_args();
        args.city = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_requires_category() {
        let mut args = base_args();
        args.category = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_url_file_alone() {
        let mut args = base_args();
        args.city = None;
        args.category = None;
        args.url_file = Some("leads.txt".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_max() {
        let mut args = base_args();
        args.max = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_skips_discovery_validation() {
        let mut args = base_args();
        args.city = None;
        args.category = None;
        args.init = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_categories_split_and_trimmed() {
        let mut args = base_args();
        args.category = Some("plumber, roofer,,electrician ".to_string());
        assert_eq!(args.categories(), vec!["plumber", "roofer", "electrician"]);
    }
}
