//! End-to-end cycles over the single-seed demo graph.

use std::collections::HashSet;

use rayon::prelude::*;
use tracklet_pipeline::{
    Error, FullMatch, Hit, MemoryKind, MonitorSettings, Phase, PipelineConfig, Projection,
    RecordKind, Sector, SectorSettings, Stage, StageIo, StageKernel, StubId, StubPair,
    StubTriplet, Track, Tracklet, MATCH_TALLY_STREAM, PROJECTION_OCCUPANCY_STREAM,
};

const MEMORIES: &str = include_str!("../../../demos/single_seed/memorymodules.dat");
const PROCESSES: &str = include_str!("../../../demos/single_seed/processingmodules.dat");
const WIRES: &str = include_str!("../../../demos/single_seed/wires.dat");

fn sector(settings: SectorSettings) -> Sector {
    let config = PipelineConfig::parse(MEMORIES, PROCESSES, WIRES).unwrap();
    let mut sector = Sector::new(0, settings).unwrap();
    sector.configure(&config).unwrap();
    sector
}

fn admit_seed(sector: &mut Sector) {
    let hits = [
        (Hit::new(0.10, 25.0, 2.5, 1).with_truth(7), "PS10G_1_A"),
        (Hit::new(0.12, 35.0, 3.5, 2).with_truth(7), "PS10G_2_A"),
        (Hit::new(0.15, 50.0, 5.0, 3).with_truth(7), "2S_1_A"),
    ];
    for (hit, source) in &hits {
        assert!(sector.admit_hit(hit, source).unwrap());
    }
}

#[test]
fn demo_graph_configures() {
    let sector = sector(SectorSettings::default());
    assert_eq!(sector.phase(), Phase::Ready);
    assert_eq!(sector.registry().memory_count(), 18);
    assert_eq!(sector.registry().processor_count(), 10);
    assert_eq!(sector.wiring().edges().len(), 18);
}

#[test]
fn one_seed_becomes_one_track() {
    let mut sector = sector(SectorSettings::default());
    admit_seed(&mut sector);
    assert_eq!(sector.phase(), Phase::Admitting);

    let mut accepted: Vec<Track> = Vec::new();
    sector.run_pipeline(&mut accepted).unwrap();
    assert_eq!(sector.phase(), Phase::Draining);

    let tracklets = sector.all_tracklets();
    assert_eq!(tracklets.len(), 1);
    assert_eq!(tracklets[0].seed_index, 0);
    assert_eq!(tracklets[0].tp_seed, Some(7));
    assert_eq!(sector.seed_match(7), HashSet::from([0]));

    let fm = sector.memory("FM_L1L2_L3PHIA").unwrap().get::<FullMatch>();
    assert_eq!(fm.len(), 1);
    assert!(fm[0].residual_phi.abs() < 1e-9);
    assert!(fm[0].residual_z.abs() < 1e-9);

    let tracks = sector.tracks();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].stubs, [StubId(0), StubId(1), StubId(2)]);
    assert_eq!(accepted, tracks);
    assert_eq!(sector.memory("CT_L1L2").unwrap().len(), 1);
}

#[test]
fn stage_order_is_left_to_the_driver() {
    let mut sector = sector(SectorSettings::default());
    admit_seed(&mut sector);

    for stage in Stage::PIPELINE.iter().rev() {
        if *stage != Stage::PurgeDuplicate {
            sector.execute(*stage).unwrap();
        }
    }
    assert!(sector.tracks().is_empty());
    assert_eq!(sector.memory("AS_L1PHIA").unwrap().len(), 1);
}

#[test]
fn nearest_stub_per_layer_is_matched() {
    let mut sector = sector(SectorSettings::default());
    admit_seed(&mut sector);
    assert!(sector
        .admit_hit(&Hit::new(0.16, 50.0, 5.0, 3), "2S_1_A")
        .unwrap());

    let mut accepted = Vec::new();
    sector.run_pipeline(&mut accepted).unwrap();

    assert_eq!(sector.memory("CM_L3PHIA1").unwrap().len(), 2);
    let fm = sector.memory("FM_L1L2_L3PHIA").unwrap().get::<FullMatch>();
    assert_eq!(fm.len(), 1);
    assert_eq!(fm[0].stub.id, StubId(2));
}

#[test]
fn duplicates_are_purged() {
    let run = |min_shared: usize| {
        let mut sector = sector(SectorSettings::default().with_min_shared_stubs(min_shared));
        admit_seed(&mut sector);
        assert!(sector
            .admit_hit(&Hit::new(0.1001, 25.2, 2.52, 1), "PS10G_1_A")
            .unwrap());
        let mut accepted = Vec::new();
        sector.run_pipeline(&mut accepted).unwrap();
        (sector.tracks().len(), accepted.len())
    };

    // The two tracks share the outer seed stub and the matched stub.
    assert_eq!(run(3), (2, 2));
    assert_eq!(run(2), (2, 1));
}

#[test]
fn clean_resets_every_memory_between_cycles() {
    let monitor = MonitorSettings {
        input_link: true,
        track_projection_occupancy: true,
        n_matches: true,
    };
    let mut sector = sector(SectorSettings::default().with_monitor(monitor));

    for _ in 0..2 {
        admit_seed(&mut sector);
        let mut accepted = Vec::new();
        sector.run_pipeline(&mut accepted).unwrap();
        assert_eq!(accepted.len(), 1);
        sector.write_memories(MemoryKind::TrackFit, sector.cycles() == 0).unwrap();
        sector.clean().unwrap();
        assert!(sector.occupancy().iter().all(|(_, n)| *n == 0));
    }

    let diagnostics = sector.diagnostics();
    assert_eq!(
        diagnostics.contents(MATCH_TALLY_STREAM).unwrap(),
        "1 0 0\n1 0 0\n"
    );
    assert_eq!(
        diagnostics.contents(PROJECTION_OCCUPANCY_STREAM).unwrap(),
        "TPROJ_L1L2A_L3PHIA 1\nTPROJ_L1L2A_L3PHIA 1\n"
    );
    let dump = diagnostics.contents("TF_L1L2").unwrap();
    assert_eq!(dump.lines().filter(|l| l.starts_with("track=")).count(), 2);
    assert!(dump.starts_with("cycle 0\n"));
}

#[test]
fn sectors_run_in_parallel() {
    let settings = SectorSettings::default();
    let config = PipelineConfig::parse(MEMORIES, PROCESSES, WIRES).unwrap();
    let hits = vec![
        (Hit::new(0.10, 25.0, 2.5, 1), "PS10G_1_A"),
        (Hit::new(0.12, 35.0, 3.5, 2), "PS10G_2_A"),
        (Hit::new(0.15, 50.0, 5.0, 3), "2S_1_A"),
    ];

    let mut sectors: Vec<Sector> = (0..settings.sector_count)
        .map(|i| {
            let mut s = Sector::new(i, settings.clone()).unwrap();
            s.configure(&config).unwrap();
            s
        })
        .collect();

    let counts: Vec<usize> = sectors
        .par_iter_mut()
        .map(|sector| {
            for (hit, source) in &hits {
                sector.admit_hit(hit, source)?;
            }
            let mut accepted = Vec::new();
            sector.run_pipeline(&mut accepted)?;
            Ok(accepted.len())
        })
        .collect::<tracklet_pipeline::Result<_>>()
        .unwrap();

    assert_eq!(counts[0], 1);
    assert_eq!(counts.iter().sum::<usize>(), 1);
}

/// Displaced seeding from layers 4, 5 and 6, matched in layer 1.
fn displaced_sector() -> Sector {
    let mut s = Sector::new(0, SectorSettings::default()).unwrap();
    for (tag, name) in [
        ("InputLink:", "IL_L4PHIA_2S_4_A"),
        ("InputLink:", "IL_L5PHIA_2S_5_A"),
        ("InputLink:", "IL_L6PHIA_2S_6_A"),
        ("InputLink:", "IL_L1PHIA_PS10G_1_A"),
        ("StubPairsDisplaced:", "SPD_L4PHIA1_L5PHIA1"),
        ("StubTriplets:", "ST_L4L5L6"),
        ("TrackletParameters:", "TPAR_L4L5L6A"),
        ("TrackletProjections:", "TPROJ_L4L5L6A_L1PHIA"),
        ("AllProj:", "AP_L1PHIA"),
        ("VMProjections:", "VMPROJ_L1PHIA1"),
        ("FullMatch:", "FM_L4L5L6_L1PHIA"),
        ("TrackFit:", "TF_L4L5L6"),
    ] {
        s.add_memory(tag, name).unwrap();
    }
    for (tag, name) in [
        ("TrackletEngineDisplaced:", "TED_L4PHIA1_L5PHIA1"),
        ("TripletEngine:", "TRE_L4PHIA1_L5PHIA1"),
        ("TrackletCalculatorDisplaced:", "TCD_L4L5L6A"),
        ("ProjectionRouter:", "PR_L1PHIA"),
        ("MatchProcessor:", "MP_L1PHIA"),
        ("FitTrack:", "FT_L4L5L6"),
    ] {
        s.add_processor(tag, name).unwrap();
    }
    for (memory, producer, consumer) in [
        ("IL_L4PHIA_2S_4_A", "", "TED_L4PHIA1_L5PHIA1.innervmstubin"),
        ("IL_L5PHIA_2S_5_A", "", "TED_L4PHIA1_L5PHIA1.outervmstubin"),
        (
            "SPD_L4PHIA1_L5PHIA1",
            "TED_L4PHIA1_L5PHIA1.stubpairout",
            "TRE_L4PHIA1_L5PHIA1.stubpairin",
        ),
        ("IL_L6PHIA_2S_6_A", "", "TRE_L4PHIA1_L5PHIA1.thirdvmstubin"),
        ("ST_L4L5L6", "TRE_L4PHIA1_L5PHIA1.stubtripout", "TCD_L4L5L6A.stubtripletin"),
        ("TPAR_L4L5L6A", "TCD_L4L5L6A.trackpar", "FT_L4L5L6.tpar"),
        ("TPROJ_L4L5L6A_L1PHIA", "TCD_L4L5L6A.projoutL1PHIA", "PR_L1PHIA.proj1in"),
        ("AP_L1PHIA", "PR_L1PHIA.allprojout", "MP_L1PHIA.projin"),
        ("VMPROJ_L1PHIA1", "PR_L1PHIA.vmprojoutPHIA1", ""),
        ("IL_L1PHIA_PS10G_1_A", "", "MP_L1PHIA.vmstubin"),
        ("IL_L1PHIA_PS10G_1_A", "", "MP_L1PHIA.allstubin"),
        ("FM_L4L5L6_L1PHIA", "MP_L1PHIA.matchout", "FT_L4L5L6.fullmatchin"),
        ("TF_L4L5L6", "FT_L4L5L6.trackout", ""),
    ] {
        s.wire(memory, producer, consumer).unwrap();
    }
    s.finish_configuration().unwrap();
    s
}

#[test]
fn displaced_seed_runs_through_triplets() {
    let mut sector = displaced_sector();
    // Straight line φ = 0.13 + 0.001·r, z = 0.1·r.
    let hits = [
        (Hit::new(0.20, 70.0, 7.0, 4).with_truth(9), "2S_4_A"),
        (Hit::new(0.22, 90.0, 9.0, 5).with_truth(9), "2S_5_A"),
        (Hit::new(0.24, 110.0, 11.0, 6).with_truth(9), "2S_6_A"),
        (Hit::new(0.155, 25.0, 2.5, 1).with_truth(9), "PS10G_1_A"),
        (Hit::new(0.30, 25.2, 2.5, 1), "PS10G_1_A"),
    ];
    for (hit, source) in &hits {
        assert!(sector.admit_hit(hit, source).unwrap());
    }

    let mut accepted = Vec::new();
    sector.run_pipeline(&mut accepted).unwrap();

    let pairs = sector.memory("SPD_L4PHIA1_L5PHIA1").unwrap();
    assert_eq!(pairs.record_kind(), RecordKind::StubPair);
    assert_eq!(pairs.get::<StubPair>().len(), 1);
    let triplets = sector.memory("ST_L4L5L6").unwrap().get::<StubTriplet>();
    assert_eq!(triplets.len(), 1);
    assert_eq!(
        [triplets[0].inner.id, triplets[0].middle.id, triplets[0].outer.id],
        [StubId(0), StubId(1), StubId(2)]
    );

    let tracklets = sector.all_tracklets();
    assert_eq!(tracklets.len(), 1);
    assert_eq!(tracklets[0].seed_index, 9);
    assert_eq!(tracklets[0].seed_layer, 4);
    assert_eq!(tracklets[0].stubs, [StubId(0), StubId(1), StubId(2)]);
    assert_eq!(sector.seed_match(9), HashSet::from([9]));

    // The projection router feeds both of its outputs.
    assert_eq!(sector.memory("AP_L1PHIA").unwrap().get::<Projection>().len(), 1);
    assert_eq!(sector.memory("VMPROJ_L1PHIA1").unwrap().len(), 1);

    // Both match ports see the same link; each stub is matched once.
    let fm = sector.memory("FM_L4L5L6_L1PHIA").unwrap().get::<FullMatch>();
    assert_eq!(fm.len(), 1);
    assert_eq!(fm[0].stub.id, StubId(3));
    assert!(fm[0].residual_phi.abs() < 1e-9);
    assert!(fm[0].residual_z.abs() < 1e-9);

    let tracks = sector.tracks();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].seed_index, 9);
    assert_eq!(tracks[0].stubs, [StubId(0), StubId(1), StubId(2), StubId(3)]);
    // No purge module is configured, so nothing is accepted.
    assert!(accepted.is_empty());
}

#[test]
fn tracklet_processor_pairs_in_place_until_reset() {
    let mut sector = Sector::new(0, SectorSettings::default()).unwrap();
    sector.add_memory("InputLink:", "IL_L1PHIA_PS10G_1_A").unwrap();
    sector.add_memory("InputLink:", "IL_L2PHIA_PS10G_2_A").unwrap();
    sector.add_memory("TrackletParameters:", "TPAR_L1L2A").unwrap();
    sector.add_processor("TrackletProcessor:", "TP_L1L2A").unwrap();
    sector.wire("IL_L1PHIA_PS10G_1_A", "", "TP_L1L2A.innervmstubin").unwrap();
    sector.wire("IL_L2PHIA_PS10G_2_A", "", "TP_L1L2A.outervmstubin").unwrap();
    sector.wire("TPAR_L1L2A", "TP_L1L2A.trackpar", "").unwrap();
    sector.finish_configuration().unwrap();

    sector.admit_hit(&Hit::new(0.10, 25.0, 2.5, 1), "PS10G_1_A").unwrap();
    sector.admit_hit(&Hit::new(0.11, 25.5, 2.5, 1), "PS10G_1_A").unwrap();
    sector.admit_hit(&Hit::new(0.12, 35.0, 3.5, 2), "PS10G_2_A").unwrap();

    sector.execute(Stage::TrackletProcessor).unwrap();
    sector.execute(Stage::TrackletProcessor).unwrap();
    sector.reset_stage(Stage::TrackletProcessor);
    sector.execute(Stage::TrackletProcessor).unwrap();

    let tracklets = sector.all_tracklets();
    let serials: Vec<u32> = tracklets.iter().map(|t| t.id.serial).collect();
    assert_eq!(serials, [0, 1, 2, 3, 0, 1]);
    assert!(tracklets.iter().all(|t| t.seed_index == 0));
    assert_eq!(tracklets[1].stubs, [StubId(1), StubId(2)]);
}

/// Writes tracklets where tracks belong.
struct Misrouted;

impl StageKernel for Misrouted {
    fn execute(&mut self, io: &mut StageIo<'_>) -> tracklet_pipeline::Result<()> {
        let tracklets: Vec<Tracklet> = io.read("tpar");
        io.emit("trackout", &tracklets)?;
        Ok(())
    }
}

#[test]
fn custom_kernel_errors_reach_the_driver() {
    let mut sector = Sector::new(0, SectorSettings::default()).unwrap();
    sector.add_memory("TrackFit:", "TF_L1L2").unwrap();
    sector
        .add_processor_with_kernel("FitTrack:", "FT_L1L2", Box::new(Misrouted))
        .unwrap();
    sector.wire("TF_L1L2", "FT_L1L2.trackout", "").unwrap();
    sector.finish_configuration().unwrap();

    let err = sector.execute(Stage::FitTrack).unwrap_err();
    match err {
        Error::PortMismatch {
            process,
            port,
            memory,
            expected,
            actual,
        } => {
            assert_eq!((process.as_str(), port.as_str()), ("FT_L1L2", "trackout"));
            assert_eq!(memory, "TF_L1L2");
            assert_eq!((expected, actual), (RecordKind::Tracklet, RecordKind::Track));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sector.memory("TF_L1L2").unwrap().is_empty());
}
