//! The allocation engine.
//!
//! Splits a pool of money among recipients so that nobody receives more than
//! its need. A bias factor blends two split rules:
//!
//! - `0`: every active recipient gets the same share,
//! - `1`: each recipient gets a share proportional to its need,
//!
//! and any value in between mixes the two linearly:
//!
//! $$weight_i = (1 - bias) \cdot \frac{1}{active} + bias \cdot \frac{need_i}{total\_need}$$
//!
//! Shares above a recipient's need are clamped and the overflow (the
//! *excess*) is split again among recipients that still have room. Passes
//! continue while some capping happened and the excess is above `epsilon`;
//! excess nobody can absorb is not distributed.
//!
//! The computation is pure and runs on [`Decimal`] without intermediate
//! rounding. Conversion to cents belongs to [`apportion`].
//!
//! # Examples
//!
//! ```rust
//! use engine::{AllocationPolicy, RecipientSnapshot, allocate};
//! use rust_decimal::Decimal;
//! use uuid::Uuid;
//!
//! let candidates: Vec<_> = [20, 30, 25, 50]
//!     .into_iter()
//!     .map(|need| RecipientSnapshot::new(Uuid::new_v4(), Some(Decimal::from(need)), Decimal::ZERO))
//!     .collect();
//!
//! let result = allocate(Decimal::from(100), &candidates, &AllocationPolicy::default());
//! let amounts: Vec<Decimal> = result.amounts().collect();
//! assert_eq!(
//!     amounts,
//!     vec![Decimal::from(20), Decimal::new(275, 1), Decimal::from(25), Decimal::new(275, 1)]
//! );
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, RecipientSnapshot, ResultEngine};

/// Blend between equal shares (`0`) and need-proportional shares (`1`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct BiasFactor(Decimal);

impl BiasFactor {
    pub const EQUAL: BiasFactor = BiasFactor(Decimal::ZERO);
    pub const PROPORTIONAL: BiasFactor = BiasFactor(Decimal::ONE);

    /// Validates that `value` lies in `[0, 1]`.
    pub fn new(value: Decimal) -> ResultEngine<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(EngineError::InvalidBiasFactor(format!(
                "bias factor must be between 0 and 1, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// A missing bias factor behaves as [`BiasFactor::EQUAL`].
    pub fn from_optional(value: Option<Decimal>) -> ResultEngine<Self> {
        value.map_or(Ok(Self::EQUAL), Self::new)
    }

    pub fn value(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for BiasFactor {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BiasFactor> for Decimal {
    fn from(value: BiasFactor) -> Self {
        value.0
    }
}

/// Parameters of a single [`allocate`] call.
///
/// They are passed explicitly on every call; the engine reads no ambient
/// configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationPolicy {
    pub bias: BiasFactor,
    /// Redistribution stops once the excess of a pass is not above this value.
    pub epsilon: Decimal,
}

impl AllocationPolicy {
    pub fn new(bias: BiasFactor) -> Self {
        Self {
            bias,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_epsilon(mut self, epsilon: Decimal) -> Self {
        self.epsilon = epsilon;
        self
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            bias: BiasFactor::EQUAL,
            epsilon: default_epsilon(),
        }
    }
}

/// `0.0001`
pub fn default_epsilon() -> Decimal {
    Decimal::new(1, 4)
}

/// Amount granted to one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub recipient_id: Uuid,
    pub amount: Decimal,
}

/// Outcome of [`allocate`], one entry per candidate in input order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocations: Vec<Allocation>,
    pub total_distributed: Decimal,
    /// `total_distributed / candidates`, zero allocations included.
    pub average_amount: Decimal,
}

impl AllocationResult {
    pub fn amounts(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.allocations.iter().map(|a| a.amount)
    }
}

/// Sum of the needs of `candidates`: the largest pool they can absorb.
pub fn max_distributable(candidates: &[RecipientSnapshot]) -> Decimal {
    candidates.iter().map(RecipientSnapshot::need).sum()
}

/// Splits `total_amount` among `candidates`.
///
/// Never fails: no candidates, no capacity or no weight all degrade to zero
/// allocations. Callers reject non-positive amounts before getting here.
pub fn allocate(
    total_amount: Decimal,
    candidates: &[RecipientSnapshot],
    policy: &AllocationPolicy,
) -> AllocationResult {
    if candidates.is_empty() {
        return AllocationResult::default();
    }

    let needs: Vec<Decimal> = candidates.iter().map(RecipientSnapshot::need).collect();
    let granted = distribute(total_amount.max(Decimal::ZERO), &needs, policy);

    let total_distributed: Decimal = granted.iter().copied().sum();
    let average_amount = total_distributed / Decimal::from(candidates.len());
    let allocations = candidates
        .iter()
        .zip(granted)
        .map(|(candidate, amount)| Allocation {
            recipient_id: candidate.id,
            amount,
        })
        .collect();

    AllocationResult {
        allocations,
        total_distributed,
        average_amount,
    }
}

/// Weighted, capped split with redistribution of the excess.
///
/// Each iteration of the loop is one pass: it splits `amount_left` by weight,
/// clamps at the remaining need, then excludes every candidate whose need has
/// been met and retries with the excess. Every pass that continues excludes at
/// least one candidate, so there are at most `needs.len()` passes.
fn distribute(total_amount: Decimal, needs: &[Decimal], policy: &AllocationPolicy) -> Vec<Decimal> {
    let n = needs.len();
    let bias = policy.bias.value();
    // Held fixed across passes.
    let total_need: Decimal = needs.iter().copied().sum();

    let mut remaining: Vec<Decimal> = needs.to_vec();
    let mut excluded = vec![false; n];
    let mut excluded_count = 0usize;
    let mut granted = vec![Decimal::ZERO; n];
    let mut amount_left = total_amount;
    let mut passes = 0usize;

    loop {
        passes += 1;
        let active = n - excluded_count;
        if active == 0 {
            break;
        }

        let equal = Decimal::ONE / Decimal::from(active);
        let weights: Vec<Decimal> = (0..n)
            .map(|i| {
                if excluded[i] || remaining[i] <= Decimal::ZERO {
                    return Decimal::ZERO;
                }
                let proportional = if total_need > Decimal::ZERO {
                    remaining[i] / total_need
                } else {
                    equal
                };
                (Decimal::ONE - bias) * equal + bias * proportional
            })
            .collect();

        let total_weight: Decimal = weights.iter().copied().sum();
        if total_weight <= Decimal::ZERO {
            break;
        }

        let shares = split_by_weight(amount_left, &weights, total_weight);

        let mut pass = vec![Decimal::ZERO; n];
        let mut excess = Decimal::ZERO;
        let mut capped = false;
        for i in (0..n).filter(|&i| !weights[i].is_zero()) {
            let mut share = shares[i];
            if share > remaining[i] {
                excess += share - remaining[i];
                share = remaining[i];
                capped = true;
            }
            pass[i] = share;
            granted[i] += share;
        }

        if !capped || excess <= policy.epsilon {
            break;
        }

        for i in 0..n {
            if excluded[i] {
                continue;
            }
            if pass[i] >= remaining[i] {
                excluded[i] = true;
                excluded_count += 1;
                remaining[i] = Decimal::ZERO;
            } else {
                remaining[i] -= pass[i];
            }
        }
        amount_left = excess;
    }

    tracing::trace!(passes, candidates = n, "allocation finished");
    granted
}

/// `amount * weight_i / total_weight` for every weighted slot.
///
/// The last weighted slot takes what is left, so the shares of a pass add up
/// to exactly `amount` despite the finite precision of the divisions.
fn split_by_weight(amount: Decimal, weights: &[Decimal], total_weight: Decimal) -> Vec<Decimal> {
    let mut shares = vec![Decimal::ZERO; weights.len()];
    let Some(last) = weights.iter().rposition(|w| !w.is_zero()) else {
        return shares;
    };

    let mut assigned = Decimal::ZERO;
    for (i, weight) in weights.iter().enumerate().take(last) {
        if weight.is_zero() {
            continue;
        }
        let share = (*weight / total_weight) * amount;
        shares[i] = share;
        assigned += share;
    }
    shares[last] = (amount - assigned).max(Decimal::ZERO);
    shares
}

/// Converts exact allocations into cents without breaking any cap.
///
/// Every amount is truncated to cents, then the cents lost to truncation
/// (the rounded `total_distributed` minus the truncated sum) are handed out
/// one by one, largest fractional remainder first, to recipients whose
/// truncated amount is still below their need. The output is aligned with
/// `result.allocations`.
pub fn apportion(result: &AllocationResult, candidates: &[RecipientSnapshot]) -> Vec<MoneyCents> {
    let hundred = Decimal::ONE_HUNDRED;

    let mut cents = Vec::with_capacity(result.allocations.len());
    let mut remainders = Vec::with_capacity(result.allocations.len());
    for allocation in &result.allocations {
        let floor = MoneyCents::from_decimal_trunc(allocation.amount).unwrap_or(MoneyCents::ZERO);
        remainders.push(allocation.amount * hundred - Decimal::from(floor.cents()));
        cents.push(floor);
    }

    let target = MoneyCents::from_decimal_round(result.total_distributed).unwrap_or(MoneyCents::ZERO);
    let mut missing = (target - cents.iter().copied().sum::<MoneyCents>()).cents();
    if missing <= 0 {
        return cents;
    }

    let need_cents: Vec<MoneyCents> = candidates
        .iter()
        .map(|c| MoneyCents::from_decimal_trunc(c.need()).unwrap_or(MoneyCents::ZERO))
        .collect();

    let mut order: Vec<usize> = (0..cents.len()).collect();
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]).then(a.cmp(&b)));
    for i in order {
        if missing == 0 {
            break;
        }
        if remainders[i].is_zero() {
            continue;
        }
        if need_cents.get(i).is_some_and(|need| cents[i] < *need) {
            cents[i] += MoneyCents::new(1);
            missing -= 1;
        }
    }

    cents
}
