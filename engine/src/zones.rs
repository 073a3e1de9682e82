//! Multiplier zone partition.
//!
//! The multiplier board splits into three color zones:
//! - **RED**: the zero-valued slots, where a falling symbol lands.
//! - **YELLOW**: the non-zero slots directly adjacent to a red slot, the
//!   low-variance band around break-even.
//! - **GREEN**: every remaining slot, the winning band.
//!
//! YELLOW and GREEN are further split into a low and a high half by
//! multiplier magnitude (index breaks ties), which is what the RTP governor
//! steers between. For the default board `[4, 2, 1.4, 0, 0.5, 0, 1.2, 1.5, 5]`
//! this yields RED {3,5}, YELLOW {2,4,6} (high {2,6}, low {4}) and
//! GREEN {0,1,7,8} (high {0,8}, low {1,7}).

/// The three color zones of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zone {
    Red,
    Yellow,
    Green,
}

/// Governor steering within a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    /// The whole zone, used until the governor has enough data.
    Full,
    /// The lower-paying half, used to pull RTP down.
    Low,
    /// The higher-paying half, used to push RTP up.
    High,
}

/// Precomputed zone partition for one multiplier board.
#[derive(Clone, Debug)]
pub struct ZoneMap {
    multipliers: Vec<f64>,
    red: Vec<usize>,
    yellow: Vec<usize>,
    green: Vec<usize>,
    yellow_low: Vec<usize>,
    yellow_high: Vec<usize>,
    green_low: Vec<usize>,
    green_high: Vec<usize>,
}

impl ZoneMap {
    pub fn from_multipliers(multipliers: &[f64]) -> Self {
        let red: Vec<usize> = multipliers
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == 0.0)
            .map(|(i, _)| i)
            .collect();
        let is_red = |i: usize| red.binary_search(&i).is_ok();

        let mut yellow = Vec::new();
        let mut green = Vec::new();
        for (i, m) in multipliers.iter().enumerate() {
            if *m == 0.0 {
                continue;
            }
            let beside_red = (i > 0 && is_red(i - 1)) || is_red(i + 1);
            if beside_red {
                yellow.push(i);
            } else {
                green.push(i);
            }
        }

        let (yellow_low, yellow_high) = split_by_magnitude(&yellow, multipliers);
        let (green_low, green_high) = split_by_magnitude(&green, multipliers);

        Self {
            multipliers: multipliers.to_vec(),
            red,
            yellow,
            green,
            yellow_low,
            yellow_high,
            green_low,
            green_high,
        }
    }

    pub fn multiplier(&self, index: usize) -> f64 {
        self.multipliers[index]
    }

    pub fn board_len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn red(&self) -> &[usize] {
        &self.red
    }

    pub fn zone(&self, zone: Zone) -> &[usize] {
        match zone {
            Zone::Red => &self.red,
            Zone::Yellow => &self.yellow,
            Zone::Green => &self.green,
        }
    }

    /// Candidate slots for a zone and band.
    ///
    /// An empty band falls back to the full zone (a one-slot zone has an
    /// empty low half). An empty RED zone falls back to the minimum-multiplier
    /// slots; an empty YELLOW or GREEN zone falls back to the whole board.
    pub fn candidates(&self, zone: Zone, band: Band) -> Vec<usize> {
        let full = self.zone(zone);
        if full.is_empty() {
            return self.zone_fallback(zone);
        }
        let banded = match (zone, band) {
            (Zone::Red, _) | (_, Band::Full) => full,
            (Zone::Yellow, Band::Low) => &self.yellow_low,
            (Zone::Yellow, Band::High) => &self.yellow_high,
            (Zone::Green, Band::Low) => &self.green_low,
            (Zone::Green, Band::High) => &self.green_high,
        };
        if banded.is_empty() {
            full.to_vec()
        } else {
            banded.to_vec()
        }
    }

    fn zone_fallback(&self, zone: Zone) -> Vec<usize> {
        match zone {
            Zone::Red => {
                // No zero slots configured: a losing symbol lands on the
                // cheapest slots instead.
                let min = self
                    .multipliers
                    .iter()
                    .cloned()
                    .fold(f64::INFINITY, f64::min);
                self.multipliers
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| **m == min)
                    .map(|(i, _)| i)
                    .collect()
            }
            Zone::Yellow | Zone::Green => (0..self.multipliers.len()).collect(),
        }
    }
}

/// Sort zone members ascending by (multiplier, index) and split: the first
/// floor(n/2) form the low half, the rest the high half. Results are returned
/// in ascending index order.
fn split_by_magnitude(zone: &[usize], multipliers: &[f64]) -> (Vec<usize>, Vec<usize>) {
    let mut ordered: Vec<usize> = zone.to_vec();
    ordered.sort_by(|a, b| {
        multipliers[*a]
            .partial_cmp(&multipliers[*b])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(b))
    });
    let cut = ordered.len() / 2;
    let mut low = ordered[..cut].to_vec();
    let mut high = ordered[cut..].to_vec();
    low.sort_unstable();
    high.sort_unstable();
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinko_types::config::DEFAULT_MULTIPLIERS;

    #[test]
    fn default_board_partition() {
        let zones = ZoneMap::from_multipliers(&DEFAULT_MULTIPLIERS);
        assert_eq!(zones.red(), &[3, 5]);
        assert_eq!(zones.zone(Zone::Yellow), &[2, 4, 6]);
        assert_eq!(zones.zone(Zone::Green), &[0, 1, 7, 8]);
    }

    #[test]
    fn default_board_bands() {
        let zones = ZoneMap::from_multipliers(&DEFAULT_MULTIPLIERS);
        assert_eq!(zones.candidates(Zone::Yellow, Band::High), vec![2, 6]);
        assert_eq!(zones.candidates(Zone::Yellow, Band::Low), vec![4]);
        assert_eq!(zones.candidates(Zone::Green, Band::High), vec![0, 8]);
        assert_eq!(zones.candidates(Zone::Green, Band::Low), vec![1, 7]);
        assert_eq!(zones.candidates(Zone::Green, Band::Full), vec![0, 1, 7, 8]);
    }

    #[test]
    fn single_slot_zone_falls_back_to_full_zone() {
        // One zero slot, one yellow neighbor on each side; low half of a
        // two-element yellow zone has one member, so no fallback there, but
        // a one-element zone's low half is empty.
        let zones = ZoneMap::from_multipliers(&[2.0, 0.5, 0.0, 3.0]);
        assert_eq!(zones.red(), &[2]);
        assert_eq!(zones.zone(Zone::Yellow), &[1, 3]);
        // Green has a single member: its low half is empty, falls back.
        assert_eq!(zones.zone(Zone::Green), &[0]);
        assert_eq!(zones.candidates(Zone::Green, Band::Low), vec![0]);
        assert_eq!(zones.candidates(Zone::Green, Band::High), vec![0]);
    }

    #[test]
    fn board_without_zeros_falls_back_to_cheapest() {
        let zones = ZoneMap::from_multipliers(&[2.0, 0.5, 0.5, 3.0]);
        assert!(zones.red().is_empty());
        assert_eq!(zones.candidates(Zone::Red, Band::Full), vec![1, 2]);
    }

    #[test]
    fn magnitude_split_breaks_ties_by_index() {
        // Zone {0,1,2,3} all 2.0: low = first two by index.
        let zones = ZoneMap::from_multipliers(&[2.0, 2.0, 2.0, 2.0]);
        assert_eq!(zones.zone(Zone::Green), &[0, 1, 2, 3]);
        assert_eq!(zones.candidates(Zone::Green, Band::Low), vec![0, 1]);
        assert_eq!(zones.candidates(Zone::Green, Band::High), vec![2, 3]);
    }
}
