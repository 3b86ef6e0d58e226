//! Property tests: conservation of principal and rewards, reference-count
//! bounds, proportional payouts and query purity over random histories.

use farm_core::{Address, Coin, Coins, Dec, DecCoins};
use farm_ledger::{Ledger, LedgerConfig, LedgerEvent};
use farm_storage::MemoryStore;
use proptest::prelude::*;

const FARMERS: [Address; 3] = [
    Address::new([1u8; 32]),
    Address::new([2u8; 32]),
    Address::new([3u8; 32]),
];
const POOLS: [&str; 2] = ["pool0", "pool1"];
const PRINCIPAL: u128 = 1_000_000;

#[derive(Debug, Clone)]
enum Op {
    Farm(usize, usize, u128),
    Unfarm(usize, usize, u128),
    Harvest(usize, usize),
    HarvestAll(usize),
    Allocate(usize, u128),
    NextBlock,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3usize, 0..2usize, 1..5_000u128).prop_map(|(f, p, a)| Op::Farm(f, p, a)),
        2 => (0..3usize, 0..2usize, 1..5_000u128).prop_map(|(f, p, a)| Op::Unfarm(f, p, a)),
        2 => (0..3usize, 0..2usize).prop_map(|(f, p)| Op::Harvest(f, p)),
        1 => (0..3usize).prop_map(Op::HarvestAll),
        2 => (0..2usize, 1..100_000u128).prop_map(|(p, a)| Op::Allocate(p, a)),
        2 => Just(Op::NextBlock),
    ]
}

fn funded_ledger() -> Ledger<MemoryStore> {
    let mut ledger = Ledger::new(MemoryStore::new(), LedgerConfig::development());
    let principal = Coins::from_coins(
        POOLS
            .iter()
            .map(|denom| Coin::new(denom, PRINCIPAL).unwrap())
            .collect(),
    )
    .unwrap();
    for farmer in &FARMERS {
        ledger.mint(farmer, &principal).unwrap();
    }
    ledger.begin_block(1);
    ledger
}

fn apply(ledger: &mut Ledger<MemoryStore>, op: &Op, minted: &mut u128) {
    let result = match op {
        Op::Farm(f, p, amount) => ledger
            .farm(&FARMERS[*f], &Coin::new(POOLS[*p], *amount).unwrap())
            .map(|_| ()),
        Op::Unfarm(f, p, amount) => ledger
            .unfarm(&FARMERS[*f], &Coin::new(POOLS[*p], *amount).unwrap())
            .map(|_| ()),
        Op::Harvest(f, p) => ledger.harvest(&FARMERS[*f], POOLS[*p]).map(|_| ()),
        Op::HarvestAll(f) => ledger.harvest_all(&FARMERS[*f]).map(|_| ()),
        Op::Allocate(p, amount) => {
            let reward = Coins::single("reward", *amount).unwrap();
            let reserve = ledger.reward_reserve();
            ledger.mint(&reserve, &reward).unwrap();
            *minted += amount;
            ledger.allocate(POOLS[*p], &DecCoins::from_coins(&reward))
        }
        Op::NextBlock => {
            ledger.begin_block(ledger.height() + 1);
            Ok(())
        }
    };
    // Only user errors are acceptable outcomes
    if let Err(err) = result {
        assert!(err.is_recoverable(), "unexpected failure: {}", err);
    }
}

fn reward(amount: u128) -> DecCoins {
    DecCoins::from_coins(&Coins::single("reward", amount).unwrap())
}

fn paid_out(ledger: &Ledger<MemoryStore>) -> u128 {
    FARMERS
        .iter()
        .map(|farmer| ledger.balance(farmer, "reward").unwrap())
        .sum()
}

/// Number of committed operations that settled a position
fn settlements(events: &[LedgerEvent]) -> u128 {
    events
        .iter()
        .filter(|event| {
            matches!(
                event,
                LedgerEvent::Farmed { .. }
                    | LedgerEvent::Unfarmed { .. }
                    | LedgerEvent::Harvested { .. }
            )
        })
        .count() as u128
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_random_history_conserves_value(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut ledger = funded_ledger();
        let mut minted = 0u128;

        for op in &ops {
            apply(&mut ledger, op, &mut minted);

            prop_assert!(ledger.check_invariants().unwrap().is_empty());

            for denom in POOLS {
                let positions = ledger.positions_by_denom(denom).unwrap();
                let staked: u128 = positions.iter().map(|p| p.amount).sum();
                let pool_stake = ledger.pool(denom).unwrap().map_or(0, |pool| pool.total_stake);
                prop_assert_eq!(staked, pool_stake);

                for (_, checkpoint) in ledger.checkpoints(denom).unwrap() {
                    prop_assert!((1..=2).contains(&checkpoint.reference_count));
                }

                // Principal never leaves the farmers plus the staking reserve
                let held: u128 = FARMERS
                    .iter()
                    .map(|farmer| ledger.balance(farmer, denom).unwrap())
                    .sum();
                let locked = ledger.balance(&ledger.staking_reserve(), denom).unwrap();
                prop_assert_eq!(held + locked, PRINCIPAL * FARMERS.len() as u128);
            }

            // Rewards are only ever moved from the reserve to farmers
            let paid: u128 = FARMERS
                .iter()
                .map(|farmer| ledger.balance(farmer, "reward").unwrap())
                .sum();
            let reserve = ledger.balance(&ledger.reward_reserve(), "reward").unwrap();
            prop_assert_eq!(paid + reserve, minted);
        }
    }

    #[test]
    fn prop_payouts_proportional_to_stake(
        a in 1u128..1_000_000,
        b in 1u128..1_000_000,
        reward in 1u128..1_000_000_000_000,
    ) {
        let mut ledger = funded_ledger();
        let reserve = ledger.reward_reserve();
        ledger.mint(&reserve, &Coins::single("reward", reward).unwrap()).unwrap();

        ledger.farm(&FARMERS[0], &Coin::new("pool0", a).unwrap()).unwrap();
        ledger.farm(&FARMERS[1], &Coin::new("pool0", b).unwrap()).unwrap();
        ledger
            .allocate("pool0", &DecCoins::from_coins(&Coins::single("reward", reward).unwrap()))
            .unwrap();

        ledger.begin_block(2);
        let paid_a = ledger.harvest(&FARMERS[0], "pool0").unwrap().amount_of("reward");
        let paid_b = ledger.harvest(&FARMERS[1], "pool0").unwrap().amount_of("reward");
        let total = a + b;

        // Never more than the exact share, and short of it only by truncation
        for (paid, stake) in [(paid_a, a), (paid_b, b)] {
            prop_assert!(paid * total <= reward * stake);
            prop_assert!(reward * stake < (paid + 2) * total);
        }
        prop_assert!(paid_a + paid_b <= reward);
    }

    #[test]
    fn prop_staked_allocations_are_paid_out(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut ledger = funded_ledger();
        let mut allocated = 0u128;
        let mut settled = 0u128;

        for op in &ops {
            if let Op::Allocate(p, _) = op {
                let stake = ledger.pool(POOLS[*p]).unwrap().map_or(0, |pool| pool.total_stake);
                if stake == 0 {
                    continue;
                }
            }
            apply(&mut ledger, op, &mut allocated);
            settled += settlements(&ledger.drain_events());
        }

        ledger.begin_block(ledger.height() + 1);
        for farmer in &FARMERS {
            ledger.harvest_all(farmer).unwrap();
        }
        settled += settlements(&ledger.drain_events());

        // Everything allocated to staked pools is paid, short only of the
        // fractional part each settlement truncates
        let paid = paid_out(&ledger);
        prop_assert!(paid <= allocated);
        prop_assert!(allocated - paid <= settled + 1);

        let outstanding = ledger
            .pools()
            .unwrap()
            .iter()
            .map(|pool| pool.outstanding_rewards.amount_of("reward"))
            .fold(Dec::ZERO, |sum, amount| sum.checked_add(amount).unwrap());
        prop_assert_eq!(outstanding, Dec::from_int(allocated - paid));
    }

    #[test]
    fn prop_same_block_touch_keeps_shares(
        a in 1u128..500_000,
        b in 1u128..500_000,
        extra in 0u128..500_000,
        first in 1u128..1_000_000_000,
        second in 1u128..1_000_000_000,
    ) {
        let mut ledger = funded_ledger();
        let reserve = ledger.reward_reserve();
        ledger.mint(&reserve, &Coins::single("reward", first + second).unwrap()).unwrap();

        ledger.farm(&FARMERS[0], &Coin::new("pool0", a).unwrap()).unwrap();
        ledger.farm(&FARMERS[1], &Coin::new("pool0", b).unwrap()).unwrap();
        ledger.allocate("pool0", &reward(first)).unwrap();

        // Touch the first position again within the block, then allocate more
        let early = if extra == 0 {
            ledger.harvest(&FARMERS[0], "pool0").unwrap()
        } else {
            ledger.farm(&FARMERS[0], &Coin::new("pool0", extra).unwrap()).unwrap()
        };
        ledger.allocate("pool0", &reward(second)).unwrap();

        ledger.begin_block(2);
        let paid_a = early.amount_of("reward")
            + ledger.harvest(&FARMERS[0], "pool0").unwrap().amount_of("reward");
        let paid_b = ledger.harvest(&FARMERS[1], "pool0").unwrap().amount_of("reward");

        // Exact shares as fractions over (a + b) * (a + extra + b)
        let before = a + b;
        let after = a + extra + b;
        let denominator = before * after;
        let exact_a = first * a * after + second * (a + extra) * before;
        let exact_b = first * b * after + second * b * before;

        prop_assert!(paid_a * denominator <= exact_a);
        prop_assert!(exact_a < (paid_a + 3) * denominator);
        prop_assert!(paid_b * denominator <= exact_b);
        prop_assert!(exact_b < (paid_b + 3) * denominator);
    }

    #[test]
    fn prop_reward_queries_are_pure(
        stake in 1u128..1_000_000,
        reward in 1u128..1_000_000_000,
    ) {
        let mut ledger = funded_ledger();
        let reserve = ledger.reward_reserve();
        ledger.mint(&reserve, &Coins::single("reward", reward).unwrap()).unwrap();
        ledger.farm(&FARMERS[0], &Coin::new("pool0", stake).unwrap()).unwrap();
        ledger
            .allocate("pool0", &DecCoins::from_coins(&Coins::single("reward", reward).unwrap()))
            .unwrap();
        ledger.begin_block(2);

        let before = ledger.store().snapshot();
        let first = ledger.rewards(&FARMERS[0], "pool0").unwrap();
        let total = ledger.total_rewards(&FARMERS[0]).unwrap();
        let second = ledger.rewards(&FARMERS[0], "pool0").unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &total);
        prop_assert_eq!(ledger.store().snapshot(), before);

        let (whole, _) = first.truncate_decimal().unwrap();
        prop_assert_eq!(ledger.harvest(&FARMERS[0], "pool0").unwrap(), whole);
    }
}
