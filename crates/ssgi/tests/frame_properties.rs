use ssgi::sequencer::{BLUR_BUFFER_LABEL, LOW_RES_LABEL, SCENE_COPY_LABEL, UPSCALED_LABEL};
use ssgi::{
    Attachment, CameraFrame, Command, Extent, FrameSchedule, FrameStage, FrameState, PassKind,
    PassSequencer, RecordingHost, ResourcePool, Settings, Slot, SsgiEffect, TargetHandle,
    Unbounded,
};

const RESOLUTIONS: [Extent; 5] = [
    Extent::new(1920, 1080),
    Extent::new(1366, 767),
    Extent::new(640, 480),
    Extent::new(3, 1),
    Extent::new(1, 1),
];

fn build(settings: &Settings, extent: Extent) -> FrameSchedule {
    let mut pool = ResourcePool::<Unbounded>::default();
    pool.begin_frame(extent).unwrap();
    let schedule = PassSequencer::new(settings).build(&mut pool).unwrap();
    pool.end_frame().unwrap();
    schedule
}

fn configurations() -> Vec<Settings> {
    let mut all = Vec::new();
    for iterations in [0, 1, 2, 3, 8] {
        for radius in [0.0, 1.0, 2.0] {
            for scale in [0.25, 0.5, 0.75, 1.0] {
                all.push(Settings {
                    filter_iterations: iterations,
                    filter_radius: radius,
                    resolution_scale: scale,
                    ..Settings::default()
                });
            }
        }
    }
    all
}

/// Passes and copies only, with releases, in the form the scenarios list them.
#[derive(Debug, PartialEq)]
enum Step {
    RayMarch(Extent),
    Upscale,
    Blur(TargetHandle, TargetHandle),
    CopyCameraColor(Extent),
    Composite,
    Release(TargetHandle),
}

fn steps(schedule: &FrameSchedule) -> Vec<Step> {
    schedule
        .commands
        .iter()
        .filter_map(|command| match command {
            Command::Allocate(_) => None,
            Command::Pass(pass) => Some(match pass.kind {
                PassKind::RayMarch => Step::RayMarch(pass.destination.target().unwrap().extent),
                PassKind::Upscale => Step::Upscale,
                PassKind::Blur => Step::Blur(
                    *pass.source.as_ref().and_then(Attachment::target).unwrap(),
                    *pass.destination.target().unwrap(),
                ),
                PassKind::Composite => Step::Composite,
            }),
            Command::CopyCameraColor { destination } => {
                Some(Step::CopyCameraColor(destination.extent))
            }
            Command::Release(target) => Some(Step::Release(*target)),
        })
        .collect()
}

#[test]
fn allocations_balance_releases_for_every_configuration() {
    for settings in configurations() {
        for extent in RESOLUTIONS {
            let schedule = build(&settings, extent);
            let allocations = schedule.commands.allocations().count();
            let releases = schedule.commands.releases().count();
            assert_eq!(allocations, releases, "{settings:?} at {extent}");
            assert!(allocations > 0);
        }
    }
}

#[test]
fn no_target_is_used_after_release() {
    for settings in configurations() {
        for extent in RESOLUTIONS {
            let schedule = build(&settings, extent);
            assert_eq!(
                schedule.commands.check_lifetimes(),
                Ok(()),
                "{settings:?} at {extent}"
            );
        }
    }
}

#[test]
fn ping_pong_releases_the_member_that_is_not_current() {
    for iterations in 0..=3u32 {
        let settings = Settings {
            filter_iterations: iterations,
            filter_radius: 1.0,
            ..Settings::default()
        };
        let schedule = build(&settings, Extent::new(320, 240));

        let Some(filter) = schedule.filter else {
            assert_eq!(iterations, 0);
            continue;
        };
        assert_ne!(filter.released, filter.result);
        assert_eq!(schedule.last_result, filter.result);
        if iterations % 2 == 1 {
            assert_eq!(filter.result, filter.blur_buffer);
            assert_eq!(filter.released, filter.upscaled);
        } else {
            assert_eq!(filter.result, filter.upscaled);
            assert_eq!(filter.released, filter.blur_buffer);
        }

        let blur_count = schedule
            .commands
            .passes()
            .filter(|pass| pass.kind == PassKind::Blur)
            .count();
        assert_eq!(blur_count, iterations as usize);
    }
}

#[test]
fn blur_source_slot_names_the_current_member() {
    let settings = Settings {
        filter_iterations: 4,
        ..Settings::default()
    };
    let schedule = build(&settings, Extent::new(64, 64));
    for pass in schedule
        .commands
        .passes()
        .filter(|pass| pass.kind == PassKind::Blur)
    {
        let source = pass.source.as_ref().and_then(Attachment::target);
        assert_eq!(pass.slot(Slot::BlurSource), source);
        assert_ne!(source, pass.destination.target());
    }
}

#[test]
fn disabled_filter_skips_upscale_and_blur() {
    for settings in configurations()
        .into_iter()
        .filter(|settings| !settings.filter_enabled())
    {
        let schedule = build(&settings, Extent::new(1280, 720));
        assert!(schedule
            .commands
            .passes()
            .all(|pass| !matches!(pass.kind, PassKind::Upscale | PassKind::Blur)));
        assert_eq!(schedule.last_result, schedule.ray_march);
        assert!(schedule.path.contains(&FrameStage::Unfiltered));
    }
}

#[test]
fn frame_index_advances_by_one_per_frame() {
    let camera = CameraFrame::perspective_gl(1.0, Extent::new(128, 72), 0.1, 100.0);
    let start = u32::MAX - 3;
    let mut effect =
        SsgiEffect::new(Settings::default(), Unbounded).with_frame_state(FrameState::new(start));
    let mut host = RecordingHost::new();

    for _ in 0..8 {
        effect.render_frame(&camera, &mut host).unwrap();
    }

    let indices: Vec<u32> = host
        .frames()
        .iter()
        .map(|frame| frame.params.frame_index)
        .collect();
    let mut expected = start;
    for index in indices {
        expected = expected.wrapping_add(1);
        assert_eq!(index, expected);
    }
    assert_eq!(effect.frame_state().index(), start.wrapping_add(8));
}

#[test]
fn unfiltered_1080p_frame_matches_expected_sequence() {
    let settings = Settings {
        filter_iterations: 0,
        resolution_scale: 0.5,
        ..Settings::default()
    };
    let schedule = build(&settings, Extent::new(1920, 1080));

    assert_eq!(schedule.ray_march.label(), LOW_RES_LABEL);
    assert_eq!(schedule.scene_copy.label(), SCENE_COPY_LABEL);
    assert_eq!(
        steps(&schedule),
        vec![
            Step::RayMarch(Extent::new(960, 540)),
            Step::CopyCameraColor(Extent::new(1920, 1080)),
            Step::Composite,
            Step::Release(schedule.scene_copy),
            Step::Release(schedule.ray_march),
        ]
    );
}

#[test]
fn two_blur_iterations_match_expected_sequence() {
    let settings = Settings {
        filter_iterations: 2,
        filter_radius: 1.0,
        resolution_scale: 0.5,
        ..Settings::default()
    };
    let schedule = build(&settings, Extent::new(1920, 1080));
    let filter = schedule.filter.unwrap();

    assert_eq!(filter.upscaled.label(), UPSCALED_LABEL);
    assert_eq!(filter.blur_buffer.label(), BLUR_BUFFER_LABEL);
    assert_eq!(filter.upscaled.extent, Extent::new(1920, 1080));
    assert_eq!(
        steps(&schedule),
        vec![
            Step::RayMarch(Extent::new(960, 540)),
            Step::Upscale,
            Step::Release(schedule.ray_march),
            Step::Blur(filter.upscaled, filter.blur_buffer),
            Step::Blur(filter.blur_buffer, filter.upscaled),
            Step::Release(filter.blur_buffer),
            Step::CopyCameraColor(Extent::new(1920, 1080)),
            Step::Composite,
            Step::Release(schedule.scene_copy),
            Step::Release(filter.upscaled),
        ]
    );
    assert_eq!(
        schedule.path,
        vec![
            FrameStage::Idle,
            FrameStage::RayMarched,
            FrameStage::Filtered,
            FrameStage::Composited
        ]
    );
}

#[test]
fn odd_iteration_count_releases_upscaled_after_the_loop() {
    let settings = Settings {
        filter_iterations: 3,
        filter_radius: 1.0,
        ..Settings::default()
    };
    let schedule = build(&settings, Extent::new(1920, 1080));
    let filter = schedule.filter.unwrap();

    let after_loop = steps(&schedule)
        .into_iter()
        .skip_while(|step| !matches!(step, Step::Blur(..)))
        .find(|step| matches!(step, Step::Release(_)));
    assert_eq!(after_loop, Some(Step::Release(filter.upscaled)));
    assert_eq!(
        schedule.commands.releases().last(),
        Some(&filter.blur_buffer)
    );
}

#[test]
fn recording_host_sees_serializable_batches() {
    let camera = CameraFrame::perspective_gl(1.0, Extent::new(32, 16), 0.1, 10.0);
    let mut effect = SsgiEffect::new(Settings::default(), Unbounded);
    let mut host = RecordingHost::new();
    effect.render_frame(&camera, &mut host).unwrap();

    let json = serde_json::to_value(&host.frames()[0].commands).unwrap();
    let ops: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|command| command["op"].as_str().unwrap())
        .collect();
    assert_eq!(ops.first(), Some(&"allocate"));
    assert_eq!(ops.last(), Some(&"release"));
    assert!(ops.contains(&"copy_camera_color"));
}
