use commonware_macros::test_traced;
use pdcp_channel::{Impairments, Tamper, Target};
use pdcp_entity::receiver::Discard;
use simulator::{run, Config, Entry, Error, Metrics, Output, SecurityConfig, Status};
use test_case::test_case;

fn config(sdu_count: u64) -> Config {
    Config {
        sdu_count,
        ..Config::default()
    }
}

/// Properties every run must satisfy.
fn check(output: &Output) {
    let metrics = &output.metrics;
    assert!(metrics.rx_deliv_final <= metrics.rx_next_final);
    assert!(metrics.rx_next_final <= metrics.tx_next_final);
    assert_eq!(metrics.tx_next_final, metrics.total_sdu_sent);
    assert_eq!(metrics.arrived(), metrics.accounted());

    // Deliveries are strictly increasing in COUNT and carry what was sent
    let mut last = None;
    for entry in &output.log {
        if let Entry::RxDeliver { count, .. } = entry {
            assert!(last.map_or(true, |last| *count > last));
            last = Some(*count);
        }
    }
    assert_eq!(output.delivered.len() as u64, metrics.delivered_sdu_count);
    for sdu in &output.delivered {
        assert_eq!(sdu.payload.as_ref(), format!("SDU_data_{}", sdu.id).as_bytes());
    }

    // At most one delivery per SDU
    let mut ids: Vec<_> = output.delivered.iter().map(|sdu| sdu.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), output.delivered.len());

    // A tampered SDU is never delivered
    for entry in &output.log {
        if let Entry::ChannelTamper { sdu_id, .. } = entry {
            assert!(output.delivered.iter().all(|sdu| sdu.id != *sdu_id));
        }
    }

    // Every skipped COUNT is attributed to a t-Reordering expiry
    let skipped: u64 = output
        .log
        .iter()
        .map(|entry| match entry {
            Entry::RxReorderingExpired { skipped, .. } => *skipped,
            _ => 0,
        })
        .sum();
    assert_eq!(skipped, metrics.skipped_counts);
}

fn count<F: Fn(&Entry) -> bool>(output: &Output, predicate: F) -> usize {
    output.log.iter().filter(|entry| predicate(*entry)).count()
}

#[test_traced]
fn test_tamper_detected() {
    let output = run(&config(5).with_tamper()).unwrap();
    check(&output);

    let tampered: Vec<_> = output
        .log
        .iter()
        .filter(|entry| matches!(entry, Entry::ChannelTamper { .. }))
        .collect();
    assert_eq!(tampered.len(), 1);
    assert_eq!(tampered[0].sdu_id(), Some(1));

    let failures: Vec<_> = output
        .log
        .iter()
        .filter_map(|entry| match entry {
            Entry::RxVerifyFail {
                sdu_id,
                received_mac,
                calculated_mac,
                status,
                ..
            } => Some((*sdu_id, *received_mac, *calculated_mac, *status)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    let (sdu_id, received, calculated, status) = failures[0];
    assert_eq!(sdu_id, 1);
    assert_ne!(received, calculated);
    assert_eq!(status, Status::Failed);

    let metrics = &output.metrics;
    assert_eq!(metrics.discarded_corrupted, 1);
    assert_eq!(metrics.delivered_sdu_count, 4);
    assert_eq!(metrics.channel_tampered, 1);
    assert_eq!(metrics.out_of_order_deliveries, 1);
    assert_eq!(metrics.skipped_counts, 1);
    assert_eq!(metrics.rx_deliv_final, 5);
    assert_eq!(metrics.buffered_final, 0);
    assert_eq!(
        count(&output, |entry| matches!(
            entry,
            Entry::RxReorderingExpired { .. }
        )),
        1
    );
}

#[test]
fn test_tamper_survives_corruption() {
    for seed in 0..3000 {
        let cfg = Config {
            impairments: Some(Impairments {
                corruption: 1.0,
                ..Impairments::none()
            }),
            seed,
            ..config(3)
        }
        .with_tamper();
        let output = run(&cfg).unwrap();
        check(&output);

        assert_eq!(output.metrics.channel_tampered, 1);
        assert_eq!(
            count(&output, |entry| matches!(
                entry,
                Entry::RxVerifyPass { sdu_id: 1, .. } | Entry::RxDeliver { sdu_id: 1, .. }
            )),
            0,
            "seed {seed}"
        );
        assert_eq!(
            count(&output, |entry| matches!(entry, Entry::RxDiscard { sdu_id: 1, .. })),
            1,
            "seed {seed}"
        );
    }
}

#[test_case(Target::Ciphertext; "ciphertext")]
#[test_case(Target::MacI; "mac")]
fn test_tamper_target(target: Target) {
    let cfg = Config {
        tamper: Some(Tamper { sdu_id: 0, target }),
        ..config(3)
    };
    let output = run(&cfg).unwrap();
    check(&output);
    assert_eq!(output.metrics.discarded_corrupted, 1);
    assert_eq!(output.metrics.delivered_sdu_count, 2);
    let detail = output.log.iter().find_map(|entry| match entry {
        Entry::ChannelTamper { detail, .. } => Some(detail.clone()),
        _ => None,
    });
    assert!(detail.unwrap().contains(&target.to_string()));
}

#[test]
fn test_clean_channel() {
    let output = run(&config(10)).unwrap();
    check(&output);

    let metrics = &output.metrics;
    assert_eq!(metrics.total_sdu_sent, 10);
    assert_eq!(metrics.delivered_sdu_count, 10);
    assert_eq!(metrics.rx_next_final, 10);
    assert_eq!(metrics.rx_deliv_final, 10);
    assert_eq!(metrics.tx_next_final, 10);
    assert_eq!(
        metrics.discarded_duplicates + metrics.discarded_old + metrics.discarded_corrupted,
        0
    );
    assert_eq!(metrics.out_of_order_deliveries, 0);

    // Every SDU follows the same path, in order
    assert_eq!(count(&output, |e| matches!(e, Entry::ChannelOk { .. })), 10);
    assert_eq!(
        count(&output, |e| matches!(
            e,
            Entry::RxVerifyPass {
                status: Status::Passed,
                ..
            }
        )),
        10
    );
    let delivered: Vec<_> = output.delivered.iter().map(|sdu| sdu.id).collect();
    assert_eq!(delivered, (0..10).collect::<Vec<_>>());
    assert!(matches!(
        output.log[0],
        Entry::TxProtect {
            sdu_id: 0,
            count: 0,
            sn: 0,
            hfn: 0,
            ..
        }
    ));
    assert_eq!(output.log[1], Entry::ChannelOk { sdu_id: 0 });
    assert!(matches!(
        output.log[2],
        Entry::RxVerifyPass {
            sdu_id: 0,
            count: 0,
            status: Status::Passed,
            ..
        }
    ));
    assert_eq!(
        output.log[3],
        Entry::RxDeliver {
            sdu_id: 0,
            count: 0,
            skipped: 0
        }
    );
}

#[test]
fn test_duplicates_discarded() {
    let cfg = Config {
        impairments: Some(Impairments {
            duplication: 1.0,
            ..Impairments::none()
        }),
        ..config(10)
    };
    let output = run(&cfg).unwrap();
    check(&output);
    assert_eq!(output.metrics.channel_duplicated, 10);
    assert_eq!(output.metrics.delivered_sdu_count, 10);
    assert_eq!(output.metrics.discarded_duplicates, 10);

    // First arrival of COUNT 3 is delivered, the second is a duplicate
    let rx: Vec<_> = output
        .log
        .iter()
        .filter(|entry| {
            entry.sdu_id() == Some(3)
                && matches!(entry, Entry::RxDeliver { .. } | Entry::RxDiscard { .. })
        })
        .cloned()
        .collect();
    assert_eq!(
        rx,
        vec![
            Entry::RxDeliver {
                sdu_id: 3,
                count: 3,
                skipped: 0
            },
            Entry::RxDiscard {
                sdu_id: 3,
                count: Some(3),
                reason: Discard::Duplicate
            },
        ]
    );
}

#[test]
fn test_reordered_frames_delivered_in_order() {
    let cfg = Config {
        impairments: Some(Impairments {
            reordering: 0.3,
            reorder_delay: 4,
            ..Impairments::none()
        }),
        seed: 11,
        ..config(200)
    };
    let output = run(&cfg).unwrap();
    check(&output);
    let metrics = &output.metrics;
    assert!(metrics.channel_reorder_events > 0);
    assert!(count(&output, |e| matches!(e, Entry::RxBuffer { .. })) > 0);

    // A delay shorter than t-Reordering never loses anything
    assert_eq!(metrics.delivered_sdu_count, 200);
    assert_eq!(metrics.out_of_order_deliveries, 0);
    assert_eq!(metrics.discarded_old, 0);
    let delivered: Vec<_> = output.delivered.iter().map(|sdu| sdu.id).collect();
    assert_eq!(delivered, (0..200).collect::<Vec<_>>());
}

#[test]
fn test_late_frames_are_old() {
    // Frames delayed past t-Reordering arrive after their COUNT was given up on
    let cfg = Config {
        impairments: Some(Impairments {
            reordering: 0.2,
            reorder_delay: 8,
            ..Impairments::none()
        }),
        t_reordering: 2,
        seed: 3,
        ..config(300)
    };
    let output = run(&cfg).unwrap();
    check(&output);
    let metrics = &output.metrics;
    assert!(metrics.discarded_old > 0);
    assert!(metrics.out_of_order_deliveries > 0);
    assert_eq!(
        metrics.delivered_sdu_count + metrics.discarded_old,
        metrics.total_sdu_sent
    );
}

#[test]
fn test_loss_without_drain() {
    let cfg = Config {
        impairments: Some(Impairments {
            loss: 0.5,
            ..Impairments::none()
        }),
        drain: false,
        t_reordering: 1_000,
        seed: 5,
        ..config(100)
    };
    let output = run(&cfg).unwrap();
    check(&output);
    let metrics = &output.metrics;
    assert!(metrics.channel_lost > 0);
    assert!(metrics.buffered_final > 0);
    assert!(metrics.rx_deliv_final < metrics.rx_next_final);
}

#[test_case(12, 0; "short seed 0")]
#[test_case(12, 1; "short seed 1")]
#[test_case(12, 2; "short seed 2")]
#[test_case(18, 0; "long seed 0")]
#[test_case(18, 1; "long seed 1")]
fn test_invariants_under_impairments(sn_bits: u8, seed: u64) {
    let cfg = Config {
        impairments: Some(Impairments {
            loss: 0.05,
            duplication: 0.05,
            reordering: 0.1,
            corruption: 0.05,
            reorder_delay: 5,
        }),
        sn_bits,
        seed,
        ..config(1_000)
    }
    .with_tamper();
    let output = run(&cfg).unwrap();
    check(&output);
    let metrics = &output.metrics;
    assert!(metrics.channel_lost > 0);
    assert!(metrics.channel_duplicated > 0);
    assert!(metrics.channel_corrupted > 0);
    assert!(metrics.discarded_duplicates > 0);
    assert!(metrics.discarded_corrupted > 0);
    assert_eq!(metrics.buffered_final, 0);
}

#[test]
fn test_sn_wrap() {
    // Long enough to wrap a 12-bit SN twice
    let cfg = Config {
        impairments: Some(Impairments {
            reordering: 0.05,
            duplication: 0.02,
            reorder_delay: 3,
            ..Impairments::none()
        }),
        seed: 9,
        ..config(10_000)
    };
    let output = run(&cfg).unwrap();
    check(&output);
    assert_eq!(output.metrics.delivered_sdu_count, 10_000);
    assert_eq!(output.metrics.rx_deliv_final, 10_000);
    let hfns: Vec<_> = output
        .log
        .iter()
        .filter_map(|entry| match entry {
            Entry::TxProtect {
                sdu_id: 4096,
                sn,
                hfn,
                ..
            } => Some((*sn, *hfn)),
            _ => None,
        })
        .collect();
    assert_eq!(hfns, vec![(0, 1)]);
}

#[test]
fn test_narrow_window() {
    let cfg = Config {
        impairments: Some(Impairments {
            reordering: 0.2,
            reorder_delay: 6,
            ..Impairments::none()
        }),
        window_size: Some(2),
        seed: 4,
        ..config(200)
    };
    let output = run(&cfg).unwrap();
    check(&output);
    assert!(output.metrics.discarded_old > 0);
}

#[test]
fn test_deterministic() {
    let cfg = Config {
        impairments: Some(Impairments::default()),
        seed: 42,
        ..config(500)
    };
    let a = run(&cfg).unwrap();
    let b = run(&cfg).unwrap();
    assert_eq!(a.log, b.log);
    assert_eq!(a.samples, b.samples);
    let strip = |metrics: &Metrics| Metrics {
        simulation_duration: 0.0,
        ..metrics.clone()
    };
    assert_eq!(strip(&a.metrics), strip(&b.metrics));
}

#[test]
fn test_samples() {
    let output = run(&config(1_000)).unwrap();
    assert_eq!(output.samples.len(), 200);
    assert_eq!(output.samples[0].step, 5);
    let last = output.samples.last().unwrap();
    assert_eq!(last.step, 1_000);
    assert_eq!(last.tx_next, 1_000);
    assert_eq!(last.rx_deliv, 1_000);

    let cfg = Config {
        sample_interval: Some(3),
        ..config(10)
    };
    let steps: Vec<_> = run(&cfg)
        .unwrap()
        .samples
        .iter()
        .map(|sample| sample.step)
        .collect();
    assert_eq!(steps, vec![3, 6, 9, 10]);
}

#[test]
fn test_json_output() {
    let output = run(&config(3).with_tamper()).unwrap();
    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["log"][0]["event"], "tx_protect");
    assert_eq!(value["log"][0]["macI"].as_str().unwrap().len(), 8);
    assert_eq!(value["metrics"]["totalSduSent"], 3);
    assert_eq!(value["metrics"]["discardedCorrupted"], 1);
    assert!(value["metrics"]["simulationDuration"].is_f64());
    assert!(value["samples"].is_array());
    assert!(value.get("delivered").is_none());
}

#[test]
fn test_configuration_errors() {
    assert!(matches!(run(&config(0)), Err(Error::InvalidSduCount(0))));
    assert!(matches!(
        run(&Config {
            sn_bits: 16,
            ..config(10)
        }),
        Err(Error::Entity(_))
    ));
    assert!(matches!(
        run(&Config {
            window_size: Some(4096),
            ..config(10)
        }),
        Err(Error::Entity(_))
    ));
    assert!(matches!(
        run(&Config {
            security: SecurityConfig {
                ciphering_key: vec![0; 8],
                ..SecurityConfig::default()
            },
            ..config(10)
        }),
        Err(Error::Security(_))
    ));
    assert!(matches!(
        run(&Config {
            security: SecurityConfig {
                bearer: 32,
                ..SecurityConfig::default()
            },
            ..config(10)
        }),
        Err(Error::Security(_))
    ));
    assert!(matches!(
        run(&Config {
            impairments: Some(Impairments {
                loss: 1.5,
                ..Impairments::none()
            }),
            ..config(10)
        }),
        Err(Error::Channel(_))
    ));
    assert!(matches!(
        run(&Config {
            tamper: Some(Tamper {
                sdu_id: 10,
                target: Target::MacI
            }),
            ..config(10)
        }),
        Err(Error::TamperOutOfRange { .. })
    ));
}

#[test]
fn test_parse_key() {
    let key = simulator::parse_key("0x0123456789ABCDEF 0123456789ABCDEF").unwrap();
    assert_eq!(key, simulator::config::DEFAULT_KEY.to_vec());
    assert!(matches!(
        simulator::parse_key("not hex"),
        Err(Error::MalformedKey(_))
    ));
}
