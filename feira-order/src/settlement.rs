use feira_shared::money::round2;
use rust_decimal::Decimal;
use serde::Serialize;

/// How one completed order's money divides between platform and seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub marketplace_fee: Decimal,
    pub seller_earnings: Decimal,
}

/// The one place fee math exists.
///
/// The fee is the rounded platform cut; the seller gets exactly the rest,
/// shipping included (paying the courier is the seller's responsibility).
/// `fee + earnings == total` always holds, so the ledger reconstructs.
pub fn split(total: Decimal, fee_rate: Decimal) -> Settlement {
    let marketplace_fee = round2(total * fee_rate);
    Settlement {
        marketplace_fee,
        seller_earnings: total - marketplace_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_eight_percent() {
        let s = split(dec!(25.00), dec!(0.08));
        assert_eq!(s.marketplace_fee, dec!(2.00));
        assert_eq!(s.seller_earnings, dec!(23.00));
    }

    #[test]
    fn test_split_reconstructs_exactly() {
        for total in [dec!(19.99), dec!(0.01), dec!(123.45), dec!(7.77)] {
            let s = split(total, dec!(0.08));
            assert_eq!(s.marketplace_fee + s.seller_earnings, total);
        }
    }

    #[test]
    fn test_split_rounds_fee_half_away_from_zero() {
        // 19.99 * 0.08 = 1.5992 -> 1.60
        let s = split(dec!(19.99), dec!(0.08));
        assert_eq!(s.marketplace_fee, dec!(1.60));
        assert_eq!(s.seller_earnings, dec!(18.39));
    }

    #[test]
    fn test_zero_rate_gives_seller_everything() {
        let s = split(dec!(50.00), Decimal::ZERO);
        assert_eq!(s.marketplace_fee, Decimal::ZERO);
        assert_eq!(s.seller_earnings, dec!(50.00));
    }
}
