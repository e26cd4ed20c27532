use rust_decimal::Decimal;

use crate::db::{AttorneyRecord, ConsultationType};

/// How a quoted price was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBasis {
    Hourly,
    Package,
    /// Fixed booking whose package name matched nothing.
    UnmatchedPackage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount: Decimal,
    pub basis: PriceBasis,
}

/// Price a consultation against the attorney's rate card.
///
/// `None` when the hourly amount does not fit in a `Decimal`.
pub fn quote(
    attorney: &AttorneyRecord,
    consultation_type: ConsultationType,
    duration_minutes: i32,
    package_id: Option<&str>,
) -> Option<Quote> {
    let quote = match consultation_type {
        ConsultationType::Hourly => Quote {
            amount: hourly_amount(attorney.hourly_rate, duration_minutes)?,
            basis: PriceBasis::Hourly,
        },
        ConsultationType::Fixed => match package_id.and_then(|name| attorney.package(name)) {
            Some(package) => Quote {
                amount: package.price,
                basis: PriceBasis::Package,
            },
            None => Quote {
                amount: Decimal::ZERO,
                basis: PriceBasis::UnmatchedPackage,
            },
        },
    };
    Some(quote)
}

pub fn hourly_amount(hourly_rate: Decimal, duration_minutes: i32) -> Option<Decimal> {
    hourly_rate
        .checked_mul(Decimal::from(duration_minutes))?
        .checked_div(Decimal::from(60))
        .map(|amount| amount.round_dp(2))
}
