//! An+B arguments of `:nth-child()` and `:nth-of-type()`.

/// Sibling positions are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionTest {
    Exact(i64),
    Last,
    /// Positions `offset`, `offset + step`, `offset + 2*step`, ...
    Forward { step: i64, offset: i64 },
    /// Positions `offset`, `offset - step`, ... down to 1.
    Backward { step: i64, offset: i64 },
}

impl PositionTest {
    pub fn matches(&self, position: usize, sibling_count: usize) -> bool {
        let position = position as i64;
        match *self {
            PositionTest::Exact(index) => position == index,
            PositionTest::Last => position == sibling_count as i64,
            PositionTest::Forward { step, offset } => position
                .checked_sub(offset)
                .is_some_and(|gap| gap >= 0 && gap.checked_rem(step) == Some(0)),
            PositionTest::Backward { step, offset } => offset
                .checked_sub(position)
                .is_some_and(|gap| gap >= 0 && gap.checked_rem(step) == Some(0)),
        }
    }
}

/// Parsed An+B value. `multiplier` is `None` for a fixed index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NthIndex {
    pub multiplier: Option<i64>,
    pub offset: i64,
}

impl NthIndex {
    pub fn position_test(&self) -> PositionTest {
        match self.multiplier {
            Some(a) if a < 0 => PositionTest::Backward {
                step: a.saturating_abs(),
                offset: self.offset,
            },
            Some(a) => PositionTest::Forward {
                step: a,
                offset: self.offset,
            },
            None => PositionTest::Exact(self.offset),
        }
    }
}

pub fn parse_nth(raw: &str) -> Option<NthIndex> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if compact.is_empty() {
        return None;
    }
    match compact.as_str() {
        "odd" => {
            return Some(NthIndex {
                multiplier: Some(2),
                offset: 1,
            });
        }
        "even" => {
            return Some(NthIndex {
                multiplier: Some(2),
                offset: 0,
            });
        }
        _ => {}
    }

    let Some((a_raw, b_raw)) = compact.split_once('n') else {
        return Some(NthIndex {
            multiplier: None,
            offset: parse_signed(&compact)?,
        });
    };

    let multiplier = match a_raw {
        "" | "+" => 1,
        "-" => -1,
        digits => parse_signed(digits)?,
    };
    let mut offset = if b_raw.is_empty() {
        0
    } else {
        // The sign is mandatory between the n-term and the offset.
        if !b_raw.starts_with(['+', '-']) {
            return None;
        }
        parse_signed(b_raw)?
    };

    if multiplier == 0 {
        return Some(NthIndex {
            multiplier: None,
            offset,
        });
    }
    // i64::MIN has no absolute value.
    let step = multiplier.checked_abs()?;
    // Smallest non-negative offset reachable by adding |A|; same index set.
    if offset < 0 {
        offset = offset.rem_euclid(step);
    }
    Some(NthIndex {
        multiplier: Some(multiplier),
        offset,
    })
}

fn parse_signed(raw: &str) -> Option<i64> {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected(arg: &str, count: usize) -> Vec<usize> {
        let test = parse_nth(arg).expect("valid nth").position_test();
        (1..=count).filter(|p| test.matches(*p, count)).collect()
    }

    #[test]
    fn keywords() {
        assert_eq!(selected("odd", 5), vec![1, 3, 5]);
        assert_eq!(selected("EVEN", 5), vec![2, 4]);
        assert_eq!(selected("odd", 5), selected("2n+1", 5));
    }

    #[test]
    fn periodic_forward() {
        assert_eq!(selected("2n+1", 5), vec![1, 3, 5]);
        assert_eq!(selected("3n", 7), vec![3, 6]);
        assert_eq!(selected("n", 3), vec![1, 2, 3]);
        assert_eq!(selected("3n+3", 7), vec![3, 6]);
        assert_eq!(selected("n+4", 6), vec![4, 5, 6]);
        assert_eq!(selected(" 2n + 1 ", 4), vec![1, 3]);
    }

    #[test]
    fn negative_offset_is_normalized() {
        let parsed = parse_nth("3n-2").expect("valid");
        assert_eq!(
            parsed,
            NthIndex {
                multiplier: Some(3),
                offset: 1
            }
        );
        assert_eq!(selected("3n-2", 7), vec![1, 4, 7]);
    }

    #[test]
    fn negative_multiplier_counts_back_from_offset() {
        assert_eq!(selected("-n+2", 5), vec![1, 2]);
        assert_eq!(selected("-2n+5", 5), vec![1, 3, 5]);
    }

    #[test]
    fn fixed_index_and_zero_multiplier() {
        assert_eq!(selected("3", 5), vec![3]);
        assert_eq!(selected("0n+2", 5), vec![2]);
        assert_eq!(
            parse_nth("0n+2"),
            Some(NthIndex {
                multiplier: None,
                offset: 2
            })
        );
        assert!(selected("-1", 5).is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_nth(""), None);
        assert_eq!(parse_nth("first"), None);
        assert_eq!(parse_nth("2n1"), None);
        assert_eq!(parse_nth("n+"), None);
        assert_eq!(parse_nth("xn+1"), None);
    }

    #[test]
    fn out_of_range_multiplier_is_rejected() {
        assert_eq!(parse_nth("-9223372036854775808n-1"), None);
        assert_eq!(parse_nth("99999999999999999999n"), None);
        let widest = NthIndex {
            multiplier: Some(i64::MIN),
            offset: i64::MIN,
        };
        assert!(!widest.position_test().matches(1, 3));
    }
}
