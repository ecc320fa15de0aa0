use horen::app::PlayerApp;
use horen::audio::NullBackend;
use horen::bridge::{ChannelBridge, HostEnd, InboundEvent};
use horen::config;
use horen::data::{DataCenter, JsonDataCenter};
use horen::model::{ItemStatus, PlayList, PlayListItem, Track};
use horen::session::{PlaybackSession, SessionState};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

type App = PlayerApp<NullBackend, JsonDataCenter, ChannelBridge>;

fn track(src: &str, title: &str, duration: f64) -> Track {
    let mut track = Track::new(src, title);
    track.artist = Some(String::from("Band"));
    track.album = Some(String::from("Record"));
    track.duration = duration;
    track
}

fn app_in(dir: &Path) -> (App, HostEnd) {
    let data = JsonDataCenter::open(dir).expect("open data");
    let (bridge, host) = ChannelBridge::pair();
    let session = PlaybackSession::with_seed(NullBackend::new(), 3);
    (PlayerApp::new(session, data, bridge), host)
}

fn saved_default(dir: &Path) -> PlayList {
    let playlists: Vec<PlayList> =
        config::load_json(&dir.join("playlists.json")).expect("playlists");
    playlists
        .into_iter()
        .find(|playlist| playlist.title == "default")
        .expect("default playlist")
}

#[test]
fn opened_files_play_and_report_to_the_shell() {
    let dir = tempdir().expect("tempdir");
    let (mut app, host) = app_in(dir.path());
    app.startup().expect("startup");

    let tracks = vec![
        track("/music/a.mp3", "a", 120.0),
        track("/music/b.mp3", "b", 90.0),
    ];
    app.handle_inbound(InboundEvent::FilesOpened(tracks));
    assert_eq!(app.session().state(), SessionState::Loading);

    let now = Instant::now();
    app.run_once(now).expect("run");
    assert_eq!(app.session().state(), SessionState::Playing);
    assert!(app.timer().is_armed());

    app.run_once(now + Duration::from_millis(600)).expect("run");

    let messages = host.drain();
    let channels: Vec<&str> = messages.iter().map(|m| m.channel.as_str()).collect();
    assert_eq!(
        channels,
        vec!["mainWindow:setTitle", "mainWindow:setProgressBar"]
    );
    assert_eq!(messages[0].payload, "a - Band");
    let progress = messages[1].payload.as_f64().expect("number");
    assert!((0.0..=1.0).contains(&progress));

    let saved = saved_default(dir.path());
    assert_eq!(saved.name, "默认列表");
    assert_eq!(saved.children.len(), 2);
    assert!(saved.children.iter().all(|c| c.status == ItemStatus::Paused));
}

#[test]
fn replies_from_the_shell_are_handled_by_the_loop() {
    let dir = tempdir().expect("tempdir");
    let (mut app, host) = app_in(dir.path());
    app.startup().expect("startup");

    app.open_files().expect("open files");
    host.reply(&InboundEvent::FilesOpened(vec![track("/music/x.mp3", "x", 30.0)]))
        .expect("reply");

    app.run_once(Instant::now()).expect("run");
    assert_eq!(app.session().queue().len(), 1);

    app.run_once(Instant::now()).expect("run");
    assert_eq!(
        app.session().current_track().map(|t| t.src.as_str()),
        Some("/music/x.mp3")
    );

    let messages = host.drain();
    assert_eq!(messages[0].channel, "file:open");
    assert!(messages.iter().any(|m| m.channel == "mainWindow:setTitle"));
}

#[test]
fn startup_restores_queue_and_resumes_at_saved_offset() {
    let dir = tempdir().expect("tempdir");
    let cached = vec![
        track("/music/one.mp3", "one", 200.0),
        track("/music/two.mp3", "two", 200.0),
    ];
    config::save_json(&dir.path().join("cache.json"), &cached).expect("cache");
    let saved = PlayList {
        title: String::from("default"),
        name: String::from("默认列表"),
        update_at: 1,
        current_index: 1,
        children: vec![
            PlayListItem {
                src: String::from("/music/one.mp3"),
                status: ItemStatus::Paused,
                seek: 0.0,
            },
            PlayListItem {
                src: String::from("/music/missing.mp3"),
                status: ItemStatus::Paused,
                seek: 0.0,
            },
            PlayListItem {
                src: String::from("/music/two.mp3"),
                status: ItemStatus::Paused,
                seek: 50.0,
            },
        ],
    };
    config::save_json(&dir.path().join("playlists.json"), &vec![saved]).expect("playlists");

    let (mut app, _host) = app_in(dir.path());
    app.startup().expect("startup");

    let srcs: Vec<&str> = app.session().queue().iter().map(|t| t.src.as_str()).collect();
    assert_eq!(srcs, vec!["/music/one.mp3", "/music/two.mp3"]);
    assert_eq!(app.albums().len(), 1);

    // The saved index points at the unavailable entry, so there is nothing
    // to resume.
    app.resume().expect("resume");
    assert_eq!(app.session().state(), SessionState::Idle);
}

#[test]
fn resume_restores_saved_position() {
    let dir = tempdir().expect("tempdir");
    let cached = vec![
        track("/music/one.mp3", "one", 200.0),
        track("/music/two.mp3", "two", 200.0),
    ];
    config::save_json(&dir.path().join("cache.json"), &cached).expect("cache");

    {
        let (mut app, _host) = app_in(dir.path());
        app.startup().expect("startup");
        app.set_queue(cached.clone());
        app.session_mut()
            .load_track(cached[1].clone())
            .expect("load");
        app.run_once(Instant::now()).expect("run");
        app.seek(0.25).expect("seek");
        app.save_playlist().expect("save");
    }

    let saved = saved_default(dir.path());
    assert_eq!(saved.current_index, 1);
    assert_eq!(saved.children[0].seek, 0.0);
    assert_eq!(saved.children[1].seek, 50.0);

    let (mut app, _host) = app_in(dir.path());
    app.startup().expect("startup");
    app.resume().expect("resume");
    app.run_once(Instant::now()).expect("run");

    assert_eq!(
        app.session().current_track().map(|t| t.src.as_str()),
        Some("/music/two.mp3")
    );
    assert_eq!(app.session().seek(), 50.0);
}

#[test]
fn close_saves_and_asks_the_shell_to_close() {
    let dir = tempdir().expect("tempdir");
    let (mut app, host) = app_in(dir.path());
    app.startup().expect("startup");
    app.handle_inbound(InboundEvent::FilesOpened(vec![track("/music/a.mp3", "a", 60.0)]));
    app.run_once(Instant::now()).expect("run");

    app.close().expect("close");

    assert!(!app.timer().is_armed());
    assert_eq!(app.session().state(), SessionState::Idle);
    let last = host.drain().pop().expect("message");
    assert_eq!(last.channel, "mainWindow:close");
    assert_eq!(saved_default(dir.path()).children.len(), 1);
}

#[test]
fn deleting_from_the_queue_persists_what_remains() {
    let dir = tempdir().expect("tempdir");
    let (mut app, _host) = app_in(dir.path());
    app.startup().expect("startup");
    app.set_queue(vec![
        track("/music/a.mp3", "a", 60.0),
        track("/music/b.mp3", "b", 60.0),
    ]);

    app.delete_from_queue("/music/a.mp3");
    let saved = saved_default(dir.path());
    assert_eq!(saved.children.len(), 1);
    assert_eq!(saved.children[0].src, "/music/b.mp3");

    app.empty_queue();
    assert!(app.session().queue().is_empty());
    assert_eq!(saved_default(dir.path()).children.len(), 1);
}

#[test]
fn failed_data_responses_leave_state_alone() {
    let dir = tempdir().expect("tempdir");
    let (mut app, _host) = app_in(dir.path());
    app.startup().expect("startup");

    let response = app.data().get_track_by_src("/nowhere/song.mp3");
    assert_eq!(response.code, 0);
    assert!(app.session().queue().is_empty());
    assert!(app.lyrics().is_empty());
    assert_eq!(app.cover_uri(), None);
}

#[test]
fn mute_and_order_toggle() {
    let dir = tempdir().expect("tempdir");
    let (mut app, _host) = app_in(dir.path());

    app.toggle_mute();
    assert!(app.session().is_muted());
    app.toggle_mute();
    assert!(!app.session().is_muted());

    let before = app.session().policy();
    app.toggle_order();
    assert_ne!(app.session().policy(), before);
    app.toggle_order();
    assert_eq!(app.session().policy(), before);

    app.set_volume(2.0);
    assert_eq!(app.session().volume(), 1.0);
}

#[test]
fn unwritable_playlist_file_does_not_stop_playback() {
    let dir = tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("playlists.json")).expect("block playlists file");
    let (mut app, host) = app_in(dir.path());
    app.startup().expect("startup");

    host.reply(&InboundEvent::FilesOpened(vec![
        track("/music/a.mp3", "a", 60.0),
        track("/music/b.mp3", "b", 60.0),
    ]))
    .expect("reply");

    app.run_once(Instant::now()).expect("run");
    assert_eq!(app.session().queue().len(), 2);
    assert_eq!(
        app.session().current_track().map(|t| t.src.as_str()),
        Some("/music/a.mp3")
    );
    assert_eq!(app.session().state(), SessionState::Playing);

    // Closing still reports the failed save, after telling the shell.
    assert!(app.close().is_err());
    let last = host.drain().pop().expect("message");
    assert_eq!(last.channel, "mainWindow:close");
}
