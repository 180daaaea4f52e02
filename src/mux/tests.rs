// SPDX-License-Identifier: MPL-2.0

use super::*;
use crate::{
    daily::DailyImage,
    error::ErrorKind,
    shm_receiver::ShmReceiver,
    testing::{FakeDesktop, FakeProducer, FakeReceiver, MemoryCanvas, SenderBoard},
};

type Mux = SourceMultiplexer<FakeReceiver, FakeProducer, FakeDesktop>;

const ORIGINAL: &str = "/usr/share/backgrounds/original.png";

fn mux_with(board: &SenderBoard, producer: FakeProducer) -> Mux {
    SourceMultiplexer::new(
        FakeReceiver::new(board),
        producer,
        FakeDesktop::new(ORIGINAL),
        None,
    )
}

fn presenter() -> Presenter<MemoryCanvas> {
    Presenter::new(MemoryCanvas::new(8, 8), 0)
}

fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::new(2, 2).save(&path).unwrap();
    path
}

/// Number of sources holding external resources.
fn running(mux: &Mux) -> usize {
    [
        mux.texture().is_attached(),
        mux.stream().is_running(),
        mux.slideshow().is_some(),
    ]
    .into_iter()
    .filter(|&active| active)
    .count()
}

struct Cache(DailyImage);

impl DailyImageProvider for Cache {
    fn fetch(&mut self) -> Result<DailyImage, SourceError> {
        Ok(self.0.clone())
    }
}

struct Offline;

impl DailyImageProvider for Offline {
    fn fetch(&mut self) -> Result<DailyImage, SourceError> {
        Err(SourceError::Download(String::from("offline")))
    }
}

#[test]
fn starts_idle_with_snapshot() {
    let mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));
    assert_eq!(mux.state(), MuxState::Idle);
    assert_eq!(mux.tick_period(), STREAM_PERIOD);
    assert!(mux.registry().is_showing_original());
    assert_eq!(mux.registry().original(), Some(Path::new(ORIGINAL)));
}

#[test]
fn tick_periods_follow_state() {
    let dir = tempfile::tempdir().unwrap();
    let board = SenderBoard::default();
    board.publish("obs", 2, 2);
    let mut mux = mux_with(&board, FakeProducer::new(2, 2, 1));

    mux.select_shared_texture(Some("obs")).unwrap();
    assert_eq!(mux.tick_period(), STREAM_PERIOD);

    mux.select_video(Path::new("clip.mp4")).unwrap();
    assert_eq!(mux.tick_period(), STREAM_PERIOD);

    mux.select_slideshow(dir.path(), vec![PathBuf::from("a.png")], 30, false).unwrap();
    assert_eq!(mux.tick_period(), SLIDESHOW_PERIOD);

    let image = write_png(dir.path(), "still.png");
    mux.select_image(&image).unwrap();
    assert_eq!(mux.tick_period(), STILL_PERIOD);
}

#[test]
fn selections_are_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "still.png");
    let board = SenderBoard::default();
    board.publish("obs", 4, 4);

    let mut mux = mux_with(&board, FakeProducer::new(4, 4, 5));
    let mut presenter = presenter();
    let start = Instant::now();

    let selections: [&dyn Fn(&mut Mux); 6] = [
        &|mux| mux.select_shared_texture(Some("obs")).unwrap(),
        &|mux| mux.select_video(Path::new("clip.mp4")).unwrap(),
        &|mux| {
            let files = vec![PathBuf::from("a.png")];
            mux.select_slideshow(Path::new("/slides"), files, 2, false).unwrap();
        },
        &|mux| mux.select_shared_texture(None).unwrap(),
        &|mux| mux.select_image(&image).unwrap(),
        &|mux| mux.select_video(Path::new("clip.mp4")).unwrap(),
    ];

    for (step, select) in selections.iter().enumerate() {
        select(&mut mux);
        assert!(running(&mux) <= 1, "after selection {step}");

        for tick in 0..4u64 {
            mux.tick_at(start + Duration::from_secs(step as u64 * 10 + tick), &mut presenter);
            assert!(running(&mux) <= 1, "after tick {tick} of selection {step}");
        }
    }

    mux.shutdown(false);
    assert_eq!(running(&mux), 0);
}

#[test]
fn resize_is_drawn_on_the_next_tick() {
    let board = SenderBoard::default();
    board.publish("obs", 4, 2);

    let mut mux = mux_with(&board, FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();
    mux.select_shared_texture(Some("obs")).unwrap();

    assert_eq!(mux.tick(&mut presenter), TickOutcome::Resized);
    assert!(presenter.canvas().presented.is_empty());
    assert!(!mux.registry().is_showing_original());

    assert_eq!(mux.tick(&mut presenter), TickOutcome::Drew);
    assert_eq!(presenter.canvas().presented, [(4, 2, 4 * 2 * 4)]);

    board.publish("obs", 8, 8);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Resized);
    assert_eq!(presenter.canvas().presented.len(), 1);

    assert_eq!(mux.tick(&mut presenter), TickOutcome::Drew);
    assert_eq!(presenter.canvas().presented[1], (8, 8, 8 * 8 * 4));
    assert_eq!(mux.frame().as_bytes().len(), 8 * 8 * 4);
}

#[test]
fn video_loops_transparently() {
    const FRAMES: usize = 3;

    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(4, 4, FRAMES));
    let mut presenter = presenter();
    mux.select_video(Path::new("clip.mp4")).unwrap();

    let outcomes: Vec<_> = (0..2 * FRAMES + 2).map(|_| mux.tick(&mut presenter)).collect();

    let mut expected = vec![TickOutcome::Spawned];
    expected.extend([TickOutcome::Drew; FRAMES]);
    expected.push(TickOutcome::Looped);
    expected.extend([TickOutcome::Drew; FRAMES]);
    assert_eq!(outcomes, expected);

    assert_eq!(mux.stream().producer().frames_read, 2 * FRAMES);
    assert_eq!(mux.stream().producer().opens, 2);
    assert_eq!(presenter.canvas().presented.len(), 2 * FRAMES);
    assert_eq!(mux.state(), MuxState::FileStream);
    assert_eq!(presenter.canvas().hides, 0);
    assert!(presenter.is_visible());
}

#[test]
fn sender_resize_keeps_surface() {
    let board = SenderBoard::default();
    board.publish("obs", 2, 2);

    let mut mux = mux_with(&board, FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();
    mux.select_shared_texture(Some("obs")).unwrap();
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Resized);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Drew);

    board.publish("obs", 4, 2);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Resized);
    assert!(presenter.is_visible());
    assert_eq!(presenter.canvas().hides, 0);

    assert_eq!(mux.tick(&mut presenter), TickOutcome::Drew);
    assert_eq!(presenter.canvas().presented.last(), Some(&(4, 2, 32)));
}

#[test]
fn slideshow_timing() {
    let board = SenderBoard::default();
    let mut mux = mux_with(&board, FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();

    let files = vec![PathBuf::from("0.jpg"), PathBuf::from("1.jpg"), PathBuf::from("2.jpg")];
    mux.select_slideshow(Path::new("/slides"), files, 2, false).unwrap();

    let start = Instant::now();
    for step in 0..6u64 {
        let outcome = mux.tick_at(start + Duration::from_millis(step * 2000), &mut presenter);
        assert_eq!(outcome, TickOutcome::SlideChanged);

        let between = start + Duration::from_millis(step * 2000 + 1000);
        assert_eq!(mux.tick_at(between, &mut presenter), TickOutcome::Unchanged);
    }

    let shown: Vec<_> = mux
        .registry()
        .desktop()
        .sets
        .iter()
        .map(|(path, persist)| {
            assert!(!persist);
            path.file_stem().unwrap().to_string_lossy().into_owned()
        })
        .collect();
    assert_eq!(shown, ["0", "1", "2", "0", "1", "2"]);
    assert!(!mux.registry().is_showing_original());
}

#[test]
fn lost_sender_restores_original() {
    let board = SenderBoard::default();
    board.publish("obs", 2, 2);

    let mut mux = mux_with(&board, FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();
    mux.select_shared_texture(Some("obs")).unwrap();
    mux.tick(&mut presenter);
    mux.tick(&mut presenter);
    assert!(presenter.is_visible());

    board.withdraw("obs");
    assert_eq!(mux.tick(&mut presenter), TickOutcome::FellBack);

    assert_eq!(mux.state(), MuxState::Idle);
    assert!(mux.registry().is_showing_original());
    assert_eq!(mux.registry().desktop().wallpaper, PathBuf::from(ORIGINAL));
    assert_eq!(mux.texture().name(), None);
    assert!(!mux.frame().is_allocated());
    assert!(!presenter.is_visible());
    assert_eq!(presenter.canvas().hides, 1);
}

#[test]
fn lost_sender_shows_daily_image() {
    let dir = tempfile::tempdir().unwrap();
    let daily = write_png(dir.path(), "daily.jpg");
    let board = SenderBoard::default();
    board.publish("obs", 2, 2);

    let mut mux = mux_with(&board, FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();
    mux.select_daily(&daily, "Lighthouse").unwrap();
    mux.select_shared_texture(Some("obs")).unwrap();
    assert!(mux.still().is_some());

    mux.tick(&mut presenter);
    board.withdraw("obs");
    assert_eq!(mux.tick(&mut presenter), TickOutcome::SwitchedToStill);
    assert_eq!(mux.state(), MuxState::StaticOrDaily);
    assert_eq!(mux.registry().desktop().wallpaper, daily);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Unchanged);
}

#[test]
fn idle_picks_up_a_new_sender() {
    let board = SenderBoard::default();
    let mut mux = mux_with(&board, FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();

    assert_eq!(mux.tick(&mut presenter), TickOutcome::Waiting);
    assert!(!mux.texture().is_attached());

    board.publish("late", 3, 3);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Resized);
    assert_eq!(mux.state(), MuxState::SharedTexture);
    assert_eq!(mux.texture().name(), Some("late"));

    assert_eq!(mux.tick(&mut presenter), TickOutcome::Drew);
    assert_eq!(presenter.canvas().presented, [(3, 3, 36)]);
}

#[test]
fn idle_waits_for_the_remembered_sender() {
    let board = SenderBoard::default();
    board.publish("other", 2, 2);

    let mut mux = SourceMultiplexer::new(
        FakeReceiver::new(&board),
        FakeProducer::new(2, 2, 1),
        FakeDesktop::new(ORIGINAL),
        Some(String::from("mine")),
    );
    let mut presenter = presenter();

    // "mine" was never seen live, so it is forgotten and any sender is taken
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Waiting);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Resized);
    assert_eq!(mux.texture().name(), Some("other"));
}

#[test]
fn unknown_sender_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "still.png");
    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));
    mux.select_image(&image).unwrap();

    let err = mux.select_shared_texture(Some("ghost")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(mux.state(), MuxState::StaticOrDaily);
}

#[test]
fn failed_probe_keeps_current_source() {
    let mut producer = FakeProducer::new(2, 2, 1);
    producer.fail_probe = true;

    let mut mux = mux_with(&SenderBoard::default(), producer);
    let files = vec![PathBuf::from("a.png")];
    mux.select_slideshow(Path::new("/slides"), files, 10, false).unwrap();

    let err = mux.select_video(Path::new("broken.mp4")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StreamDecodeFailure);
    assert_eq!(mux.state(), MuxState::Slideshow);
    assert!(mux.slideshow().is_some());
}

#[test]
fn failed_spawn_falls_back() {
    let mut producer = FakeProducer::new(2, 2, 1);
    producer.fail_open = true;

    let mut mux = mux_with(&SenderBoard::default(), producer);
    let mut presenter = presenter();
    mux.select_video(Path::new("clip.mp4")).unwrap();

    assert_eq!(mux.tick(&mut presenter), TickOutcome::FellBack);
    assert_eq!(mux.state(), MuxState::Idle);
    assert!(mux.registry().is_showing_original());
}

#[test]
fn missing_image_keeps_current_source() {
    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));
    mux.select_video(Path::new("clip.mp4")).unwrap();

    let err = mux.select_image(Path::new("/nonexistent.png")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(mux.state(), MuxState::FileStream);
    assert!(mux.registry().desktop().sets.is_empty());
}

#[test]
fn daily_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "20260101.jpg");
    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));

    let err = mux.request_daily(&mut Offline).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DownloadFailure);
    assert_eq!(mux.state(), MuxState::Idle);

    let mut cache = Cache(DailyImage {
        title: String::from("Dunes"),
        copyright: String::from("© someone"),
        path: path.clone(),
        ..DailyImage::default()
    });
    mux.request_daily(&mut cache).unwrap();
    assert_eq!(mux.state(), MuxState::StaticOrDaily);
    assert_eq!(mux.registry().desktop().wallpaper, path);
    assert_eq!(mux.still().unwrap().description(), "Dunes (© someone)");
    assert_eq!(mux.describe(), "daily image: Dunes (© someone)");
}

#[test]
fn keep_daily_image_on_exit() {
    let dir = tempfile::tempdir().unwrap();
    let daily = write_png(dir.path(), "daily.jpg");
    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));

    mux.select_daily(&daily, "Lighthouse").unwrap();
    assert_eq!(mux.shutdown(true), Some(daily.clone()));

    let desktop = mux.registry().desktop();
    assert_eq!(desktop.wallpaper, daily);
    assert_eq!(desktop.sets.last(), Some(&(daily, true)));
}

#[test]
fn restore_on_exit() {
    let dir = tempfile::tempdir().unwrap();
    let daily = write_png(dir.path(), "daily.jpg");
    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));

    mux.select_daily(&daily, "Lighthouse").unwrap();
    assert_eq!(mux.shutdown(false), None);
    assert_eq!(mux.registry().desktop().wallpaper, PathBuf::from(ORIGINAL));
    assert!(mux.registry().is_showing_original());
}

#[test]
fn keep_without_still_restores() {
    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();
    mux.select_video(Path::new("clip.mp4")).unwrap();
    mux.tick(&mut presenter);

    assert_eq!(mux.shutdown(true), None);
    assert!(!mux.stream().is_running());
    assert!(mux.registry().is_showing_original());
    assert_eq!(mux.registry().desktop().wallpaper, PathBuf::from(ORIGINAL));
}

#[test]
fn keep_last_slide_on_exit() {
    let mut mux = mux_with(&SenderBoard::default(), FakeProducer::new(2, 2, 1));
    let mut presenter = presenter();
    let files = vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")];
    mux.select_slideshow(Path::new("/slides"), files, 60, false).unwrap();
    mux.tick(&mut presenter);

    let kept = mux.shutdown(true);
    assert_eq!(kept, Some(PathBuf::from("/slides/a.jpg")));
    assert_eq!(
        mux.registry().desktop().sets.last(),
        Some(&(PathBuf::from("/slides/a.jpg"), true))
    );
}

#[test]
fn refused_image_leaves_nothing_running() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_png(dir.path(), "still.png");
    let desktop = FakeDesktop {
        fail_sets: true,
        ..FakeDesktop::new(ORIGINAL)
    };
    let mut mux = SourceMultiplexer::new(
        FakeReceiver::new(&SenderBoard::default()),
        FakeProducer::new(2, 2, 1),
        desktop,
        None,
    );
    let mut presenter = presenter();
    mux.select_video(Path::new("clip.mp4")).unwrap();
    mux.tick(&mut presenter);
    assert!(mux.stream().is_running());

    let err = mux.select_image(&image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(mux.state(), MuxState::Idle);
    assert!(mux.still().is_none());
    assert_eq!(running(&mux), 0);
}

/// Writes a sender file with the given header and `pixels` bytes of payload.
fn write_sender(dir: &Path, name: &str, width: u32, height: u32, pixels: usize) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"LWTX");
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&[0; 16]);
    bytes.resize(bytes.len() + pixels, 0x55);
    std::fs::write(dir.join(format!("{name}.frame")), bytes).unwrap();
}

fn shm_mux(dir: &Path) -> SourceMultiplexer<ShmReceiver, FakeProducer, FakeDesktop> {
    SourceMultiplexer::new(
        ShmReceiver::new(dir.to_path_buf()),
        FakeProducer::new(2, 2, 1),
        FakeDesktop::new(ORIGINAL),
        None,
    )
}

#[test]
fn oversized_sender_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_sender(dir.path(), "evil", u32::MAX, u32::MAX, 0);

    let mut mux = shm_mux(dir.path());
    let mut presenter = presenter();
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Waiting);
    assert_eq!(mux.state(), MuxState::Idle);
    assert!(!mux.frame().is_allocated());
}

#[test]
fn truncated_sender_is_never_adopted() {
    let dir = tempfile::tempdir().unwrap();
    write_sender(dir.path(), "cut", 2, 2, 6);

    let mut mux = shm_mux(dir.path());
    let mut presenter = presenter();
    for _ in 0..10 {
        assert_eq!(mux.tick(&mut presenter), TickOutcome::Waiting);
    }
    assert_eq!(mux.state(), MuxState::Idle);
    assert!(mux.registry().desktop().sets.is_empty());

    write_sender(dir.path(), "cut", 2, 2, 16);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Resized);
    assert_eq!(mux.tick(&mut presenter), TickOutcome::Drew);
}
