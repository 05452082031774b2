//! Weekly benefit amount cap check.
//!
//! Benefits are capped per employee per benefit week (ISO week of the
//! payment period start). Amounts already committed to disbursement are
//! locked; among the still-undecided payments the check keeps the subset
//! that maximizes the paid amount without crossing the cap, and flags the
//! rest.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use crate::model::{Flow, PaymentAuditReportType, State};
use crate::pipeline::Result;
use crate::storage::{payment_store, state_log_store};

use super::{AuditFailure, PaymentContext, PostProcessValidator};

/// Above this many undecided payments in one employee-week the exhaustive
/// subset search gives way to first-come-first-kept.
pub const SUBSET_SEARCH_LIMIT: usize = 16;

/// Monday of the benefit week containing `date`.
pub fn benefit_week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Choose which candidate amounts to keep so that locked + kept stays at
/// or under the cap while the kept sum is maximal. Returns a keep flag
/// per candidate.
///
/// Exhaustive over all subsets up to [`SUBSET_SEARCH_LIMIT`] candidates;
/// beyond that, keeps candidates in order while they fit.
pub fn best_under_cap(locked_total: Decimal, candidates: &[Decimal], cap: Decimal) -> Vec<bool> {
    let budget = cap - locked_total;
    if budget < Decimal::ZERO {
        return vec![false; candidates.len()];
    }

    if candidates.len() > SUBSET_SEARCH_LIMIT {
        let mut remaining = budget;
        return candidates
            .iter()
            .map(|amount| {
                if *amount <= remaining {
                    remaining -= *amount;
                    true
                } else {
                    false
                }
            })
            .collect();
    }

    let mut best_mask: u32 = 0;
    let mut best_sum = Decimal::ZERO;
    for mask in 0u32..(1 << candidates.len()) {
        let mut sum = Decimal::ZERO;
        for (index, amount) in candidates.iter().enumerate() {
            if mask & (1 << index) != 0 {
                sum += *amount;
            }
        }
        if sum <= budget && sum > best_sum {
            best_sum = sum;
            best_mask = mask;
        }
    }
    (0..candidates.len())
        .map(|index| best_mask & (1 << index) != 0)
        .collect()
}

fn is_locked(state: State) -> bool {
    matches!(
        state,
        State::PaymentAddToPubTransactionEft
            | State::PaymentAddToPubTransactionCheck
            | State::PaymentPubTransactionEftSent
            | State::PaymentPubTransactionCheckSent
            | State::PaymentComplete
    )
}

pub struct WeeklyCapValidator {
    cap: Decimal,
}

impl WeeklyCapValidator {
    pub fn new(cap: Decimal) -> WeeklyCapValidator {
        WeeklyCapValidator { cap }
    }
}

#[async_trait]
impl PostProcessValidator for WeeklyCapValidator {
    fn name(&self) -> &'static str {
        "weekly_cap"
    }

    async fn validate(
        &self,
        conn: &mut SqliteConnection,
        payment_ctx: &PaymentContext,
    ) -> Result<Option<AuditFailure>> {
        let week_start = benefit_week_start(payment_ctx.payment.period_start_date);
        let week_end = week_start + Duration::days(6);

        let in_week = payment_store::get_payments_for_employee_in_week(
            conn,
            payment_ctx.employee.employee_id,
            week_start,
            week_end,
        )
        .await?;
        let ids: Vec<_> = in_week.iter().map(|p| p.payment_id).collect();
        let states =
            state_log_store::get_latest_states_for_payments(conn, &ids, Flow::DelegatedPayment)
                .await?;

        // Locked amounts are already committed to disbursement. Undecided
        // candidates are the validated ones, in creation order; every
        // payment in the group recomputes the same partition, so each
        // sees the same verdict for itself.
        let mut locked_total = Decimal::ZERO;
        let mut candidates = Vec::new();
        for payment in &in_week {
            match states.get(&payment.payment_id).and_then(|log| log.end_state) {
                Some(state) if is_locked(state) => locked_total += payment.amount,
                Some(State::PaymentValidated) => candidates.push(payment),
                _ => {}
            }
        }

        let kept = best_under_cap(
            locked_total,
            &candidates.iter().map(|p| p.amount).collect::<Vec<_>>(),
            self.cap,
        );
        let keep_this = candidates
            .iter()
            .zip(&kept)
            .find(|(payment, _)| payment.payment_id == payment_ctx.payment.payment_id)
            .map_or(true, |(_, keep)| *keep);
        if keep_this {
            return Ok(None);
        }

        let week_total: Decimal =
            locked_total + candidates.iter().map(|p| p.amount).sum::<Decimal>();
        Ok(Some(AuditFailure {
            audit_report_type: PaymentAuditReportType::MaxWeeklyBenefits,
            details: format!(
                "week of {week_start}: total {week_total} exceeds cap {} ({} locked)",
                self.cap, locked_total,
            ),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2022-03-09 is a Wednesday.
        let wednesday = NaiveDate::from_ymd_opt(2022, 3, 9).unwrap();
        let monday = NaiveDate::from_ymd_opt(2022, 3, 7).unwrap();
        assert_eq!(benefit_week_start(wednesday), monday);
        assert_eq!(benefit_week_start(monday), monday);
    }

    #[test]
    fn test_everything_kept_under_cap() {
        let kept = best_under_cap(d("0"), &[d("400"), d("400")], d("850"));
        assert_eq!(kept, vec![true, true]);
    }

    #[test]
    fn test_excess_payment_dropped() {
        // The best subset under 850 is 500 + 300 = 800; the 400 in the
        // middle is the one flagged.
        let kept = best_under_cap(d("0"), &[d("500"), d("400"), d("300")], d("850"));
        assert_eq!(kept, vec![true, false, true]);
    }

    #[test]
    fn test_locked_amount_constrains_candidates() {
        // 500 already disbursed; a new 600 cannot fit, a new 300 can.
        assert_eq!(best_under_cap(d("500"), &[d("600")], d("850")), vec![false]);
        assert_eq!(best_under_cap(d("500"), &[d("300")], d("850")), vec![true]);
    }

    #[test]
    fn test_locked_over_cap_flags_everything() {
        let kept = best_under_cap(d("900"), &[d("10"), d("20")], d("850"));
        assert_eq!(kept, vec![false, false]);
    }

    #[test]
    fn test_exact_cap_is_allowed() {
        let kept = best_under_cap(d("0"), &[d("850")], d("850"));
        assert_eq!(kept, vec![true]);
    }

    #[test]
    fn test_oversized_group_degrades_to_fifo() {
        let candidates = vec![d("100"); SUBSET_SEARCH_LIMIT + 4];
        let kept = best_under_cap(d("0"), &candidates, d("850"));
        // First eight 100s fit under 850, the rest are flagged.
        assert_eq!(kept.iter().filter(|k| **k).count(), 8);
        assert!(kept[..8].iter().all(|k| *k));
        assert!(kept[8..].iter().all(|k| !*k));
    }
}
