//! A group's round: its market, per-player configs and payoffs.

use chrono::{DateTime, Utc};
use markets_core::{Holdings, MarketConfig, Pcode, Result};
use markets_payoff::{Payoff, PayoffCalculator};
use markets_trading::{Exchange, Market, MarketRules, Trader};
use serde::Serialize;
use tracing::info;

use crate::subsession::{GroupAssignment, Subsession};

/// A player's payoff for the round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPayoff {
    pub pcode: Pcode,
    pub id_in_group: usize,
    pub payoff: Payoff,
}

/// One group in one round.
pub struct Group<E: Exchange> {
    round_number: u32,
    id_in_subsession: usize,
    config: MarketConfig,
    market: Market<E>,
    payoffs: Vec<PlayerPayoff>,
}

impl<E: Exchange> Group<E> {
    /// Set up the group's market, endowing each member from the round config.
    pub fn setup(
        subsession: &Subsession<'_>,
        assignment: &GroupAssignment,
        exchange: E,
    ) -> Result<Self> {
        let config = subsession.config()?;
        let traders = assignment
            .members
            .iter()
            .map(|m| {
                let endowment = Holdings::new(
                    config.asset_endowment(m.id_in_group)?,
                    config.cash_endowment(m.id_in_group)?,
                );
                Ok(Trader::new(m.pcode.clone(), m.id_in_group, endowment))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            round_number: subsession.round_number(),
            id_in_subsession: assignment.id_in_subsession,
            market: Market::new(exchange, traders, MarketRules::from_config(&config)),
            config,
            payoffs: Vec::new(),
        })
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn id_in_subsession(&self) -> usize {
        self.id_in_subsession
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn market(&self) -> &Market<E> {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut Market<E> {
        &mut self.market
    }

    pub fn payoffs(&self) -> &[PlayerPayoff] {
        &self.payoffs
    }

    /// Open trading.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.market.start(now);
    }

    /// Close trading once the period has elapsed. Returns whether trading is over.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        self.market.expire(now)
    }

    /// Wait-page hook run once every player has arrived: evaluate each
    /// player's payoff from their endowment and settled holdings.
    pub fn set_payoffs(&mut self) -> Result<&[PlayerPayoff]> {
        let calculator = PayoffCalculator::from_config(&self.config)?;
        self.payoffs = self
            .market
            .traders()
            .iter()
            .map(|t| {
                Ok(PlayerPayoff {
                    pcode: t.pcode.clone(),
                    id_in_group: t.id_in_group,
                    payoff: calculator.compute(t.endowment, t.settled)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            round = self.round_number,
            group = self.id_in_subsession,
            players = self.payoffs.len(),
            "payoffs set"
        );
        Ok(&self.payoffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use markets_core::{ConfigStore, Side};
    use markets_trading::InMemoryExchange;

    use crate::subsession::Participant;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_store() -> ConfigStore {
        let mut store = ConfigStore::new();
        store
            .insert_json(
                "demo",
                r#"{
                    "num_rounds": 1,
                    "period_length": 60,
                    "x_endowment": [5, 10],
                    "y_endowment": [200, 100],
                    "utility_function": "x * y",
                    "payoff_gain_multiplier": 2
                }"#,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_setup_endows_by_id_in_group() {
        let store = make_store();
        let sub = Subsession::new(&store, "demo", 1);
        let assignment = &sub
            .creating_session(&[Participant::new("a"), Participant::new("b")])
            .unwrap()[0];

        let group = Group::setup(&sub, assignment, InMemoryExchange::new()).unwrap();

        // ids 1 and 2 index the lists modulo their length
        assert_eq!(group.market().trader("a").unwrap().settled, Holdings::new(10, 100));
        assert_eq!(group.market().trader("b").unwrap().settled, Holdings::new(5, 200));
    }

    #[test]
    fn test_round_flow_and_payoffs() {
        let store = make_store();
        let sub = Subsession::new(&store, "demo", 1);
        let assignment = &sub
            .creating_session(&[Participant::new("a"), Participant::new("b")])
            .unwrap()[0];
        let mut group = Group::setup(&sub, assignment, InMemoryExchange::new()).unwrap();

        group.start(t(0));
        let market = group.market_mut();
        let ask = market
            .enter_order("b", Side::Ask, 20, 2, t(1))
            .unwrap()
            .accepted()
            .unwrap();
        assert!(market.accept_order("a", ask.id, t(2)).unwrap().is_accepted());

        assert!(!group.tick(t(30)));
        assert!(group.tick(t(60)));

        let payoffs = group.set_payoffs().unwrap();
        // a: 10*100 -> 12*60, b: 5*200 -> 3*240
        assert_eq!(payoffs[0].pcode, "a");
        assert_eq!(payoffs[0].payoff.gains_payoff, -280 * 2 * 1000);
        assert_eq!(payoffs[1].payoff.gains_payoff, -280 * 2 * 1000);
        assert_eq!(payoffs[1].payoff.initial_payoff, 1000 * 1000);
    }
}
