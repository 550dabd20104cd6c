//! Pure helpers that shape a trip's stops into a day-by-day itinerary.

use std::collections::BTreeMap;

use omd_types::{Stop, Trip};

/// Stops that share a `day_index`, in `order_index` order.
#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryDay {
    pub day_index: i32,
    pub stops: Vec<Stop>,
}

impl ItineraryDay {
    pub fn label(&self) -> String {
        day_label(self.day_index)
    }
}

/// Group stops by day, days ascending. Stops keep their relative order when
/// `order_index` ties.
pub fn group_stops_by_day(stops: &[Stop]) -> Vec<ItineraryDay> {
    let mut days: BTreeMap<i32, Vec<Stop>> = BTreeMap::new();
    for stop in stops {
        days.entry(stop.day_index).or_default().push(stop.clone());
    }
    days.into_iter()
        .map(|(day_index, mut stops)| {
            stops.sort_by_key(|s| s.order_index);
            ItineraryDay { day_index, stops }
        })
        .collect()
}

/// `Day 1` for index 0.
pub fn day_label(index: i32) -> String {
    format!("Day {}", index + 1)
}

/// Length of a trip in days: the inclusive date span when both dates are
/// set (at least 1), otherwise one more than the highest stop day.
pub fn trip_duration(trip: &Trip, stops: &[Stop]) -> i64 {
    if let (Some(start), Some(end)) = (trip.start_date, trip.end_date) {
        let span = (end - start).num_days() + 1;
        return span.max(1);
    }
    let max_day = stops.iter().map(|s| s.day_index).max().unwrap_or(0).max(0);
    i64::from(max_day) + 1
}

/// Every stop in itinerary order, paired with its day label.
pub fn flatten_itinerary(stops: &[Stop]) -> Vec<(String, Stop)> {
    group_stops_by_day(stops)
        .into_iter()
        .flat_map(|day| {
            let label = day.label();
            day.stops.into_iter().map(move |stop| (label.clone(), stop))
        })
        .collect()
}
