//! Shared test fixtures: a builder for source events.
#![allow(dead_code)] // each test binary uses a different slice of the builder

use chrono::{NaiveDate, NaiveTime, Utc};
use einklang_common::{
    EventDate, EventFlags, GeoPoint, Location, SourceEvent, SourceType,
};

pub struct EventBuilder {
    event: SourceEvent,
}

impl EventBuilder {
    pub fn new(id: &str, source_code: &str) -> Self {
        Self {
            event: SourceEvent {
                id: id.to_string(),
                file_id: format!("file-{source_code}"),
                title: "Termin".to_string(),
                short_description: None,
                description: None,
                highlights: Vec::new(),
                location: Location::default(),
                geo: None,
                source_code: source_code.to_string(),
                source_type: SourceType::Terminliste,
                categories: Vec::new(),
                flags: EventFlags::default(),
                dates: Vec::new(),
                ingested_at: Utc::now(),
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.event.title = title.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.event.description = Some(description.to_string());
        self
    }

    pub fn city(mut self, city: &str) -> Self {
        self.event.location.city = Some(city.to_string());
        self
    }

    pub fn venue(mut self, venue: &str) -> Self {
        self.event.location.name = Some(venue.to_string());
        self
    }

    pub fn geo(mut self, latitude: f64, longitude: f64, confidence: f64) -> Self {
        self.event.geo = Some(GeoPoint { latitude, longitude, confidence });
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.event.dates.push(EventDate::on(date.parse::<NaiveDate>().unwrap()));
        self
    }

    pub fn date_at(mut self, date: &str, start: &str) -> Self {
        self.event.dates.push(EventDate {
            start_time: Some(start.parse::<NaiveTime>().unwrap()),
            ..EventDate::on(date.parse::<NaiveDate>().unwrap())
        });
        self
    }

    pub fn build(self) -> SourceEvent {
        assert!(!self.event.dates.is_empty(), "test event needs at least one date");
        self.event
    }
}
