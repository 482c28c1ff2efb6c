use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One album as delivered by an [`AlbumSource`](crate::source::AlbumSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub album_title: String,
    #[serde(default)]
    pub avg_user_rating: Option<f64>,
    pub band_name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub last_listened: Option<DateTime<Utc>>,
    #[serde(default)]
    pub release_date: String,
}

impl Album {
    pub fn new(title: &str, band: &str) -> Self {
        Self {
            album_title: title.to_string(),
            avg_user_rating: None,
            band_name: band.to_string(),
            genres: Vec::new(),
            last_listened: None,
            release_date: String::new(),
        }
    }

    pub fn with_rating(mut self, rating: Option<f64>) -> Self {
        self.avg_user_rating = rating;
        self
    }

    pub fn with_genres(mut self, genres: &[&str]) -> Self {
        self.genres = genres.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_last_listened(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.last_listened = ts;
        self
    }

    pub fn with_release_date(mut self, date: &str) -> Self {
        self.release_date = date.to_string();
        self
    }
}
