use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Monthly price of one non-billing member seat.
pub const SEAT_UNIT_PRICE: i64 = 10;
/// Monthly price of one project.
pub const PROJECT_UNIT_PRICE: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BillingItem {
    pub amount: i64,
    pub unit: i64,
    pub price: i64,
}

impl BillingItem {
    fn priced(amount: i64, unit: i64) -> Self {
        Self {
            amount,
            unit,
            price: amount * unit,
        }
    }
}

/// Billing
///
/// Output schema for GET /organizations/{slug}/billing. Members holding the
/// BILLING role are not counted as seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Billing {
    pub seats: BillingItem,
    pub projects: BillingItem,
    pub total: i64,
}

impl Billing {
    pub fn compute(billable_members: i64, projects: i64) -> Self {
        let seats = BillingItem::priced(billable_members, SEAT_UNIT_PRICE);
        let projects = BillingItem::priced(projects, PROJECT_UNIT_PRICE);
        Self {
            seats,
            projects,
            total: seats.price + projects.price,
        }
    }
}
