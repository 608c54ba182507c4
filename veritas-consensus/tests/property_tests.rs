//! Property-based tests for round voting invariants

use proptest::prelude::*;
use rust_decimal::Decimal;
use veritas_consensus::{Round, Vote};
use veritas_core::crypto::KeyPair;
use veritas_core::types::{Peer, PeerPermission};
use veritas_core::{Command, LedgerState, PublicKey, Transaction, TxHash, ValidatorSet};

fn validator_pool(weights: &[i64]) -> (Vec<KeyPair>, ValidatorSet) {
    let mut state = LedgerState::new();
    let keypairs: Vec<KeyPair> = weights
        .iter()
        .enumerate()
        .map(|(i, _)| KeyPair::from_seed(&[i as u8 + 1; 32]))
        .collect();
    for (kp, weight) in keypairs.iter().zip(weights) {
        state.peers.insert(
            kp.public_key(),
            Peer {
                public_key: kp.public_key(),
                address: "10.0.0.1:50051".into(),
                trust: Decimal::new(*weight, 2),
                active: true,
                permission: PeerPermission {
                    join_network: true,
                    join_validation: true,
                },
            },
        );
    }
    (keypairs, ValidatorSet::snapshot(&state))
}

fn proposal(n: usize) -> Transaction {
    Transaction::new(
        PublicKey::from_bytes([0xaa; 32]),
        Command::Execute { name: n.to_string() },
        n as i64,
    )
}

fn outcome_hashes(candidates: &[veritas_consensus::round::Candidate]) -> Vec<TxHash> {
    candidates.iter().map(|c| c.transaction.hash).collect()
}

proptest! {
    /// Property: closing a round partitions every proposed candidate into
    /// exactly one outcome bucket, with the eligible bucket in hash order
    #[test]
    fn round_close_partitions_all_candidates(
        weights in prop::collection::vec(1i64..100i64, 1..6),
        candidates in 1usize..5,
        votes in prop::collection::vec((0usize..6, 0usize..5, any::<bool>()), 0..30),
    ) {
        let (keypairs, validators) = validator_pool(&weights);
        let mut round = Round::new(validators);

        let hashes: Vec<TxHash> = (0..candidates)
            .map(|n| {
                let tx = proposal(n);
                let hash = tx.hash;
                round.propose(tx);
                hash
            })
            .collect();

        for (v, c, approve) in votes {
            if v >= keypairs.len() || c >= candidates {
                continue;
            }
            let vote = if approve {
                Vote::endorse(&keypairs[v], hashes[c], 1)
            } else {
                Vote::dissent(&keypairs[v], hashes[c], 1)
            };
            // Double votes are rejected; that is fine here
            let _ = round.record_vote(hashes[c], vote);
        }

        let outcome = round.close();
        let total = outcome.eligible.len() + outcome.voted_down.len() + outcome.timed_out.len();
        prop_assert_eq!(total, candidates);

        let eligible = outcome_hashes(&outcome.eligible);
        let mut sorted = eligible.clone();
        sorted.sort();
        prop_assert_eq!(eligible, sorted);
    }

    /// Property: the outcome of a round does not depend on the order in
    /// which votes arrive
    #[test]
    fn vote_arrival_order_is_irrelevant(
        weights in prop::collection::vec(1i64..100i64, 1..6),
        candidates in 1usize..5,
        votes in prop::collection::btree_map((0usize..6, 0usize..5), any::<bool>(), 0..20),
    ) {
        let (keypairs, _) = validator_pool(&weights);

        let run = |ordered: Vec<(&(usize, usize), &bool)>| {
            let (_, validators) = validator_pool(&weights);
            let mut round = Round::new(validators);
            let hashes: Vec<TxHash> = (0..candidates)
                .map(|n| {
                    let tx = proposal(n);
                    let hash = tx.hash;
                    round.propose(tx);
                    hash
                })
                .collect();

            for (&(v, c), &approve) in ordered {
                if v >= keypairs.len() || c >= candidates {
                    continue;
                }
                let vote = if approve {
                    Vote::endorse(&keypairs[v], hashes[c], 1)
                } else {
                    Vote::dissent(&keypairs[v], hashes[c], 1)
                };
                round.record_vote(hashes[c], vote).unwrap();
            }
            round.close()
        };

        let forward = run(votes.iter().collect());
        let backward = run(votes.iter().rev().collect());

        prop_assert_eq!(outcome_hashes(&forward.eligible), outcome_hashes(&backward.eligible));
        prop_assert_eq!(outcome_hashes(&forward.voted_down), outcome_hashes(&backward.voted_down));
        prop_assert_eq!(outcome_hashes(&forward.timed_out), outcome_hashes(&backward.timed_out));
    }
}
