use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

/// Identifiers double as Stripe product ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Free,
    Starter,
    Pro,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Free => "free",
            PlanId::Starter => "starter",
            PlanId::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(PlanId::Free),
            "starter" => Some(PlanId::Starter),
            "pro" => Some(PlanId::Pro),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Month,
    Year,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Month => "month",
            Interval::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "month" => Some(Interval::Month),
            "year" => Some(Interval::Year),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Eur => "eur",
        }
    }
}

/// Amount is in minor units (cents).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlanPrice {
    pub currency: Currency,
    pub interval: Interval,
    pub amount: i64,
}

/// A static catalog entry; never mutated at runtime. The Stripe-side price
/// ids created from these live in the `prices` table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
    pub prices: &'static [PlanPrice],
}

pub const PRICING_PLANS: [Plan; 3] = [
    Plan {
        id: PlanId::Free,
        name: "Free",
        description: "Start for free, no credit card required.",
        features: &["1 project", "Community support"],
        prices: &[
            PlanPrice { currency: Currency::Usd, interval: Interval::Month, amount: 0 },
            PlanPrice { currency: Currency::Usd, interval: Interval::Year, amount: 0 },
            PlanPrice { currency: Currency::Eur, interval: Interval::Month, amount: 0 },
            PlanPrice { currency: Currency::Eur, interval: Interval::Year, amount: 0 },
        ],
    },
    Plan {
        id: PlanId::Starter,
        name: "Starter",
        description: "For small teams getting started.",
        features: &["5 projects", "Email support", "Custom domain"],
        prices: &[
            PlanPrice { currency: Currency::Usd, interval: Interval::Month, amount: 990 },
            PlanPrice { currency: Currency::Usd, interval: Interval::Year, amount: 9990 },
            PlanPrice { currency: Currency::Eur, interval: Interval::Month, amount: 990 },
            PlanPrice { currency: Currency::Eur, interval: Interval::Year, amount: 9990 },
        ],
    },
    Plan {
        id: PlanId::Pro,
        name: "Pro",
        description: "For teams that need everything.",
        features: &[
            "Unlimited projects",
            "Priority support",
            "Custom domain",
            "Advanced analytics",
        ],
        prices: &[
            PlanPrice { currency: Currency::Usd, interval: Interval::Month, amount: 1990 },
            PlanPrice { currency: Currency::Usd, interval: Interval::Year, amount: 19990 },
            PlanPrice { currency: Currency::Eur, interval: Interval::Month, amount: 1990 },
            PlanPrice { currency: Currency::Eur, interval: Interval::Year, amount: 19990 },
        ],
    },
];

/// Countries whose visitors are priced in euros.
const EUR_REGIONS: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

/// Best-effort currency detection from the `Accept-Language` header region
/// (e.g. `fr-FR` -> EUR). Defaults to USD.
pub fn detect_currency(headers: &HeaderMap) -> Currency {
    let Some(accept_language) = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
    else {
        return Currency::Usd;
    };

    let first_tag = accept_language
        .split(',')
        .next()
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim();

    match first_tag.split('-').nth(1) {
        Some(region) if EUR_REGIONS.iter().any(|r| r.eq_ignore_ascii_case(region)) => {
            Currency::Eur
        }
        _ => Currency::Usd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_language(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn every_plan_covers_every_currency_interval_combination() {
        for plan in &PRICING_PLANS {
            for currency in [Currency::Usd, Currency::Eur] {
                for interval in [Interval::Month, Interval::Year] {
                    assert!(
                        plan.prices
                            .iter()
                            .any(|p| p.currency == currency && p.interval == interval),
                        "plan {} is missing {}/{}",
                        plan.id.as_str(),
                        currency.as_str(),
                        interval.as_str()
                    );
                }
            }
        }
    }

    #[test]
    fn free_plan_costs_nothing() {
        let free = PRICING_PLANS
            .iter()
            .find(|plan| plan.id == PlanId::Free)
            .unwrap();
        assert!(free.prices.iter().all(|p| p.amount == 0));
    }

    #[test]
    fn plan_id_round_trips() {
        for plan in &PRICING_PLANS {
            assert_eq!(PlanId::parse(plan.id.as_str()), Some(plan.id));
        }
        assert_eq!(PlanId::parse("enterprise"), None);
    }

    #[test]
    fn detects_eur_from_eu_region() {
        assert_eq!(detect_currency(&headers_with_language("fr-FR,fr;q=0.9")), Currency::Eur);
        assert_eq!(detect_currency(&headers_with_language("de-DE")), Currency::Eur);
    }

    #[test]
    fn defaults_to_usd() {
        assert_eq!(detect_currency(&headers_with_language("en-US,en;q=0.8")), Currency::Usd);
        assert_eq!(detect_currency(&headers_with_language("en")), Currency::Usd);
        assert_eq!(detect_currency(&headers_with_language("ja-JP")), Currency::Usd);
        assert_eq!(detect_currency(&HeaderMap::new()), Currency::Usd);
    }
}
