// PCIe metric label types

metric_enum! {
    /// Query-time view over a logical event's accumulated counts
    pub enum EventFilter {
        Total => "total",
        Miss => "miss",
        Hit => "hit",
    }
}

metric_enum! {
    pub enum Direction {
        Read => "read",
        Write => "write",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_values() {
        assert_eq!(EventFilter::all().len(), 3);
        assert_eq!(EventFilter::Hit.name(), "hit");
        assert_eq!(Direction::Write.name(), "write");
    }
}
