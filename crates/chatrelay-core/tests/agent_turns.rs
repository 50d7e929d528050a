//! End-to-end turns through `Agent` with mock plugins.

mod support;

use std::time::Duration;

use chatrelay_core::agent::{TurnError, TurnOutcome};
use chatrelay_core::skill::BoxSkill;
use chatrelay_types::config::{OverflowMode, SendMode};
use chatrelay_types::event::RelayEvent;
use chatrelay_types::message::{ChatContent, ConversationKey, MediaRef, MessageType, ReplyStatus};
use chatrelay_types::rule::{GroupMode, MessageRule, SkillWhenReplyStatus};

use support::*;

async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

#[tokio::test(start_paused = true)]
async fn deny_rule_claims_group_messages() {
    let log = log();
    let mut config = config("echo");
    let mut deny = MessageRule::for_instance("echo").with_order(1);
    deny.group_mode = GroupMode::Deny;
    config.bot_response_rule = vec![deny, MessageRule::for_instance("echo").with_order(100)];
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![],
    );

    let outcome = h
        .agent
        .handle_message("console", group("g1", "alice", "hello"))
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Dropped { .. }));
    settle().await;
    assert_eq!(h.bot_calls(), 0);
    assert!(h.sent().is_empty());

    // private messages skip the group filter and reach the default rule
    let outcome = h
        .agent
        .handle_message("console", private("alice", "hello"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed { fragments: 1 });
    assert_eq!(h.sent_texts(), vec!["echo hello"]);
}

#[tokio::test(start_paused = true)]
async fn blocking_answer_is_split_into_capped_fragments() {
    let log = log();
    let mut config = config("gpt");
    config.buffer_words_min_count = 10;
    config.max_split_count = 2;
    config.split_characters = vec!["。".to_string()];
    let text = "这是第一句。这是第二句。这是第三句。";
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Blocking(Some(text.to_string())), &log),
        vec![],
    );

    let outcome = h
        .agent
        .handle_message("console", private("u1", "讲个故事"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed { fragments: 2 });
    let sent = h.sent_texts();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("这是第三句"));
    assert_eq!(sent.concat(), text);
}

#[tokio::test(start_paused = true)]
async fn blocking_bot_waits_in_blocked_state() {
    use chatrelay_types::event::TurnState::*;

    let log = log();
    let h = harness(
        config("gpt"),
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Blocking(Some("answer".to_string())), &log),
        vec![],
    );
    let mut events = h.agent.subscribe();

    h.agent.handle_message("console", private("u1", "q")).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RelayEvent::TurnStateChanged { from, to, .. } = event {
            seen.push((from, to));
        }
    }
    assert_eq!(
        seen,
        vec![
            (Idle, Matching),
            (Matching, Admitted),
            (Admitted, Dispatched),
            (Dispatched, BlockedWait),
            (BlockedWait, Splitting),
            (Splitting, Delivering),
            (Delivering, Idle),
        ]
    );
    assert_eq!(h.sent_texts(), vec!["answer"]);
}

#[tokio::test(start_paused = true)]
async fn conversation_subscription_sees_only_its_turns() {
    let log = log();
    let h = harness(
        config("echo"),
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![],
    );
    let key = ConversationKey::new("console", "u1");
    let mut events = h.agent.subscribe_conversation(&key);

    h.agent.handle_message("console", private("u2", "hi")).await.unwrap();
    h.agent.handle_message("console", private("u1", "hi")).await.unwrap();

    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.key(), &key);
        assert_eq!(event.agent(), "main");
        if matches!(event, RelayEvent::TurnCompleted { .. }) {
            completed += 1;
        }
    }
    assert_eq!(completed, 1);
}

#[tokio::test(start_paused = true)]
async fn queued_answer_never_overtakes_the_active_one() {
    let log = log();
    let bot = MockBot::new("echo", Reply::Echo, &log)
        .with_latency("q1", Duration::from_millis(500))
        .with_latency("q2", Duration::from_millis(10));
    let h = harness(config("echo"), MockSource::new("console", &log), bot, vec![]);

    let first = h.agent.spawn_message("console", private("u1", "q1"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = h.agent.spawn_message("console", private("u1", "q2"));

    assert_eq!(
        second.await.unwrap().unwrap(),
        TurnOutcome::Queued { pending: 1 }
    );
    assert_eq!(
        first.await.unwrap().unwrap(),
        TurnOutcome::Completed { fragments: 1 }
    );
    settle().await;

    assert_eq!(h.sent_texts(), vec!["echo q1", "echo q2"]);
    let events = entries(&h.log);
    let delivered_q1 = events.iter().position(|e| e == "sent:echo q1").unwrap();
    let called_q2 = events.iter().position(|e| e == "call:q2").unwrap();
    assert!(delivered_q1 < called_q2, "q2 dispatched before q1 was delivered: {events:?}");
}

#[tokio::test(start_paused = true)]
async fn distinct_conversations_run_in_parallel() {
    let log = log();
    let bot = MockBot::new("echo", Reply::Echo, &log)
        .with_latency("slow", Duration::from_millis(500));
    let h = harness(config("echo"), MockSource::new("console", &log), bot, vec![]);

    let slow = h.agent.spawn_message("console", private("u1", "slow"));
    let fast = h.agent.spawn_message("console", private("u2", "fast"));
    assert_eq!(
        fast.await.unwrap().unwrap(),
        TurnOutcome::Completed { fragments: 1 }
    );
    assert_eq!(h.sent_texts(), vec!["echo fast"]);
    slow.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn tips_mode_rejects_with_busy_notice() {
    let log = log();
    let mut config = config("echo");
    config.overflow_mode = OverflowMode::Tips;
    config.busy_tips = "忙碌中".to_string();
    let bot = MockBot::new("echo", Reply::Echo, &log).with_latency("q1", Duration::from_millis(500));
    let h = harness(config, MockSource::new("console", &log), bot, vec![]);

    let first = h.agent.spawn_message("console", private("u1", "q1"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let err = h
        .agent
        .handle_message("console", private("u1", "q2"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::AdmissionRejected(_)));
    assert!(err.is_silent());

    first.await.unwrap().unwrap();
    settle().await;
    assert_eq!(h.sent_texts(), vec!["忙碌中", "echo q1"]);
    assert_eq!(h.bot_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn pool_tips_notifies_and_still_answers() {
    let log = log();
    let mut config = config("echo");
    config.overflow_mode = OverflowMode::PoolTips;
    config.busy_tips = "忙碌中".to_string();
    let bot = MockBot::new("echo", Reply::Echo, &log).with_latency("q1", Duration::from_millis(500));
    let h = harness(config, MockSource::new("console", &log), bot, vec![]);

    let first = h.agent.spawn_message("console", private("u1", "q1"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let outcome = h
        .agent
        .handle_message("console", private("u1", "q2"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Queued { pending: 1 });

    first.await.unwrap().unwrap();
    settle().await;
    assert_eq!(h.sent_texts(), vec!["忙碌中", "echo q1", "echo q2"]);
    assert_eq!(h.bot_calls(), 2);
    assert!(h.agent.active_conversations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn queue_mode_spaces_fragments_by_interval() {
    let log = log();
    let mut config = config("gpt");
    config.send_mode = SendMode::Queue;
    config.min_send_interval_ms = 1000;
    config.buffer_words_min_count = 4;
    config.max_split_count = 10;
    let chunks = vec!["你好。", "今天", "天气很好。", "再见"]
        .into_iter()
        .map(String::from)
        .collect();
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Chunks(chunks), &log),
        vec![],
    );

    let started = tokio::time::Instant::now();
    h.agent.handle_message("console", private("u1", "q")).await.unwrap();

    let sent = h.sent_texts();
    assert!(sent.len() > 1);
    assert_eq!(sent.concat(), "你好。今天天气很好。再见");
    let gaps = h.send_gaps();
    assert_eq!(gaps.len(), sent.len() - 1);
    for gap in gaps {
        assert!(gap >= Duration::from_millis(1000), "sends only {gap:?} apart");
    }
    // the turn waits for its last fragment
    assert!(started.elapsed() >= Duration::from_millis(1000) * (sent.len() as u32 - 1));
}

#[tokio::test(start_paused = true)]
async fn unmatched_message_is_silent() {
    let log = log();
    let mut config = config("echo");
    let mut rule = MessageRule::for_instance("echo");
    rule.content_filter = Some(chatrelay_types::rule::ContentRule {
        kind: chatrelay_types::rule::ContentRuleKind::StartsWith,
        content: "/ask".to_string(),
    });
    config.bot_response_rule = vec![rule];
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![],
    );

    let err = h
        .agent
        .handle_message("console", private("u1", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::RuleMismatch));
    settle().await;
    assert!(h.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unmatched_message_gets_the_fallback_when_configured() {
    let log = log();
    let mut config = config("echo");
    config.fallback_answer = Some("暂时无法回答".to_string());
    let mut rule = MessageRule::for_instance("echo");
    rule.content_filter = Some(chatrelay_types::rule::ContentRule {
        kind: chatrelay_types::rule::ContentRuleKind::StartsWith,
        content: "/ask".to_string(),
    });
    config.bot_response_rule = vec![rule];
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![],
    );

    let err = h
        .agent
        .handle_message("console", private("u1", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::RuleMismatch));

    // group chatter not aimed at the relay stays silent
    let err = h
        .agent
        .handle_message("console", group("g1", "alice", "hello all"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::RuleMismatch));

    let mut mention = group("g1", "alice", "hello relay");
    mention.at_list = vec!["bot-1".to_string()];
    h.agent.handle_message("console", mention).await.unwrap_err();

    settle().await;
    assert_eq!(h.bot_calls(), 0);
    assert_eq!(h.sent_texts(), vec!["暂时无法回答", "暂时无法回答"]);
}

#[tokio::test(start_paused = true)]
async fn fallback_only_when_bot_produced_nothing() {
    let log = log();
    let mut config = config("gpt");
    config.fallback_answer = Some("暂时无法回答".to_string());
    let h = harness(
        config.clone(),
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Blocking(None), &log),
        vec![],
    );
    h.agent
        .handle_message("console", private("u1", "?"))
        .await
        .unwrap();
    assert_eq!(h.sent_texts(), vec!["暂时无法回答"]);

    let empty = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Blocking(Some(String::new())), &log),
        vec![],
    );
    let outcome = empty
        .agent
        .handle_message("console", private("u1", "?"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed { fragments: 0 });
    assert!(empty.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bot_failure_notifies_and_releases_the_slot() {
    let log = log();
    let mut config = config("gpt");
    config.error_tips = "出错了".to_string();
    let bot = MockBot::new("gpt", Reply::Fail, &log).with_latency("q1", Duration::from_millis(100));
    let h = harness(config, MockSource::new("console", &log), bot, vec![]);

    let first = h.agent.spawn_message("console", private("u1", "q1"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = h.agent.spawn_message("console", private("u1", "q2"));
    assert!(matches!(
        second.await.unwrap().unwrap(),
        TurnOutcome::Queued { .. }
    ));

    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, TurnError::BotInvocation { .. }));
    settle().await;

    // the queued question still reached the bot after the failure
    assert_eq!(h.bot_calls(), 2);
    assert_eq!(h.sent_texts(), vec!["出错了", "出错了"]);
    assert!(h.agent.active_conversations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn error_detail_is_opt_in() {
    let log = log();
    let mut config = config("gpt");
    config.send_error_detail = true;
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Fail, &log),
        vec![],
    );
    let _ = h.agent.handle_message("console", private("u1", "q")).await;
    settle().await;
    let sent = h.sent_texts();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("upstream returned 502"));
}

#[tokio::test(start_paused = true)]
async fn source_skill_can_veto_and_answer_itself() {
    let log = log();
    let mut config = config("echo");
    config.skill_rules = vec![MessageRule::for_instance("ping")];
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![BoxSkill::new(PingSkill::new())],
    );

    let outcome = h
        .agent
        .handle_message("console", private("u1", "/ping"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Vetoed);
    settle().await;
    assert_eq!(h.bot_calls(), 0);
    assert_eq!(h.sent_texts(), vec!["pong"]);

    h.agent
        .handle_message("console", private("u1", "hi"))
        .await
        .unwrap();
    assert_eq!(h.sent_texts(), vec!["pong", "echo hi"]);
}

#[tokio::test(start_paused = true)]
async fn unwaited_posts_keep_their_order_across_turns() {
    let log = log();
    let mut config = config("echo");
    config.skill_rules = vec![MessageRule::for_instance("ping")];
    let source = MockSource::new("console", &log)
        .with_send_latency("pong-1", Duration::from_millis(500))
        .with_send_latency("pong-2", Duration::from_millis(10));
    let h = harness(
        config,
        source,
        MockBot::new("echo", Reply::Echo, &log),
        vec![BoxSkill::new(PingSkill::new())],
    );

    // the first turn ends while "pong-1" is still being sent
    let first = h
        .agent
        .handle_message("console", private("u1", "/ping1"))
        .await
        .unwrap();
    assert_eq!(first, TurnOutcome::Vetoed);
    let second = h
        .agent
        .handle_message("console", private("u1", "/ping2"))
        .await
        .unwrap();
    assert_eq!(second, TurnOutcome::Vetoed);

    settle().await;
    assert_eq!(h.sent_texts(), vec!["pong-1", "pong-2"]);
}

#[tokio::test(start_paused = true)]
async fn reply_skills_run_per_fragment_and_on_completion() {
    let log = log();
    let mut config = config("echo");
    let mut complete = MessageRule::for_instance("length");
    complete.skill_when_reply_status = SkillWhenReplyStatus::Complete;
    config.skill_rules = vec![MessageRule::for_instance("shout"), complete];
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![
            BoxSkill::new(ShoutSkill::new()),
            BoxSkill::new(LengthSkill::new()),
        ],
    );

    let outcome = h
        .agent
        .handle_message("console", private("u1", "hi"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed { fragments: 2 });
    assert_eq!(h.sent_texts(), vec!["ECHO HI", "length=7"]);
}

#[tokio::test(start_paused = true)]
async fn history_is_kept_and_cleared() {
    let log = log();
    let h = harness(
        config("gpt"),
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Echo, &log).with_history(),
        vec![],
    );
    let key = ConversationKey::new("console", "u1");

    h.agent.handle_message("console", private("u1", "a")).await.unwrap();
    h.agent.handle_message("console", private("u1", "b")).await.unwrap();
    assert_eq!(h.agent.history(&key).len(), 4);

    h.agent.clear_history(&key).await;
    assert!(h.agent.history(&key).is_empty());
    assert_eq!(*h.cleared.lock().unwrap(), 1);

    h.agent.handle_message("console", private("u1", "c")).await.unwrap();
    assert_eq!(*h.calls.lock().unwrap(), vec![0, 2, 0]);
}

#[tokio::test(start_paused = true)]
async fn expired_histories_are_dropped() {
    let log = log();
    let mut config = config("gpt");
    config.history.expire_in_seconds = 10;
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Echo, &log).with_history(),
        vec![],
    );
    let first = ConversationKey::new("console", "u1");
    let second = ConversationKey::new("console", "u2");

    h.agent.handle_message("console", private("u1", "a")).await.unwrap();
    assert_eq!(h.agent.tracked_histories(), 1);

    // a later turn elsewhere sweeps the expired buffer
    tokio::time::advance(Duration::from_secs(11)).await;
    h.agent.handle_message("console", private("u2", "b")).await.unwrap();
    assert_eq!(h.agent.tracked_histories(), 1);
    assert_eq!(h.agent.history(&second).len(), 2);

    // reading an expired buffer drops it
    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(h.agent.history(&second).is_empty());
    assert!(h.agent.history(&first).is_empty());
    assert_eq!(h.agent.tracked_histories(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_is_reported_and_not_remembered() {
    let log = log();
    let mut source = MockSource::new("console", &log);
    source.fail_sends = true;
    let h = harness(
        config("gpt"),
        source,
        MockBot::new("gpt", Reply::Echo, &log).with_history(),
        vec![],
    );

    let err = h
        .agent
        .handle_message("console", private("u1", "q"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::Delivery(_)));
    assert!(h.agent.history(&ConversationKey::new("console", "u1")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn reasoning_is_prefixed_and_sent_first() {
    let log = log();
    let mut config = config("r1");
    config.send_reasoning = true;
    config.reasoning_prefix = Some("[思考]".to_string());
    config.content_prefix = Some("[回答]".to_string());
    let reply = Reply::Reasoned {
        reasoning: "先想想".to_string(),
        content: "答案。".to_string(),
    };
    let h = harness(
        config.clone(),
        MockSource::new("console", &log),
        MockBot::new("r1", reply.clone(), &log),
        vec![],
    );
    h.agent.handle_message("console", private("u1", "q")).await.unwrap();
    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text(), Some("[思考]先想想"));
    assert_eq!(sent[0].status, ReplyStatus::Reasoning);
    assert_eq!(sent[1].text(), Some("[回答]答案。"));
    assert_eq!(sent[1].status, ReplyStatus::Content);

    config.send_reasoning = false;
    let quiet = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("r1", reply, &log),
        vec![],
    );
    quiet.agent.handle_message("console", private("u1", "q")).await.unwrap();
    assert_eq!(quiet.sent_texts(), vec!["答案。"]);
}

#[tokio::test(start_paused = true)]
async fn markdown_images_are_sent_separately() {
    let log = log();
    let mut config = config("gpt");
    config.split_image_from_text = true;
    config.remove_image_after_split = true;
    let answer = "看图![cat](https://x.test/cat.png)".to_string();
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Blocking(Some(answer)), &log),
        vec![],
    );
    h.agent.handle_message("console", private("u1", "q")).await.unwrap();

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text(), Some("看图"));
    match &sent[1].content {
        ChatContent::Image(media) => assert_eq!(media.uri, "https://x.test/cat.png"),
        other => panic!("expected image, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn images_become_links_on_text_only_sources() {
    let log = log();
    let mut config = config("gpt");
    config.split_image_from_text = true;
    config.remove_image_after_split = true;
    let mut source = MockSource::new("console", &log);
    source.params.out_types = vec![MessageType::Text];
    let answer = "看图![cat](https://x.test/cat.png)".to_string();
    let h = harness(
        config,
        source,
        MockBot::new("gpt", Reply::Blocking(Some(answer)), &log),
        vec![],
    );
    h.agent.handle_message("console", private("u1", "q")).await.unwrap();

    assert_eq!(h.sent_texts(), vec!["看图", "https://x.test/cat.png"]);
}

#[tokio::test(start_paused = true)]
async fn messages_the_source_cannot_handle_are_ignored() {
    let log = log();
    let mut source = MockSource::new("console", &log);
    source.params.group_in_and_out = false;
    source.params.in_types = vec![MessageType::Text];
    let h = harness(
        config("echo"),
        source,
        MockBot::new("echo", Reply::Echo, &log),
        vec![],
    );

    let outcome = h
        .agent
        .handle_message("console", group("g1", "alice", "hello"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Ignored);

    let mut picture = private("alice", "");
    picture.content = ChatContent::Image(MediaRef::from_url("https://x.test/cat.png"));
    let outcome = h.agent.handle_message("console", picture).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Ignored);

    let outcome = h
        .agent
        .handle_message("console", private("alice", "hello"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed { fragments: 1 });
    assert_eq!(h.bot_calls(), 1);
    assert_eq!(h.sent_texts(), vec!["echo hello"]);
}

#[tokio::test(start_paused = true)]
async fn slot_timeout_promotes_queue_without_cancelling_the_bot() {
    let log = log();
    let mut config = config("echo");
    config.timeout_seconds = 1;
    config.timeout_tips = Some("还在想".to_string());
    let bot = MockBot::new("echo", Reply::Echo, &log).with_latency("slow", Duration::from_secs(3));
    let h = harness(config, MockSource::new("console", &log), bot, vec![]);
    let mut events = h.agent.subscribe();

    let slow = h.agent.spawn_message("console", private("u1", "slow"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.agent.spawn_message("console", private("u1", "fast"));

    slow.await.unwrap().unwrap();
    settle().await;
    assert_eq!(h.sent_texts(), vec!["还在想", "echo fast", "echo slow"]);

    let mut timed_out = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, RelayEvent::SlotTimedOut { .. }) {
            timed_out += 1;
        }
    }
    assert_eq!(timed_out, 1);
}

#[tokio::test(start_paused = true)]
async fn source_hooks_wrap_the_bot_call() {
    let log = log();
    let h = harness(
        config("echo"),
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![],
    );
    h.agent.handle_message("console", private("u1", "hi")).await.unwrap();
    assert_eq!(
        entries(&h.log),
        vec!["before:hi", "call:hi", "sent:echo hi", "after:hi"]
    );
}

#[tokio::test(start_paused = true)]
async fn scope_and_dispose() {
    let log = log();
    let h = harness(
        config("echo"),
        MockSource::new("console", &log),
        MockBot::new("echo", Reply::Echo, &log),
        vec![],
    );

    let outcome = h
        .agent
        .handle_message("slack", private("u1", "hi"))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Ignored);

    assert!(h.agent.dispose().is_empty());
    let err = h
        .agent
        .handle_message("console", private("u1", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn streamed_chunks_follow_the_splitter() {
    let log = log();
    let mut config = config("gpt");
    config.buffer_words_min_count = 4;
    config.max_split_count = 10;
    let chunks = vec!["你好。", "今天", "天气很好。", "再见"]
        .into_iter()
        .map(String::from)
        .collect();
    let h = harness(
        config,
        MockSource::new("console", &log),
        MockBot::new("gpt", Reply::Chunks(chunks), &log),
        vec![],
    );
    h.agent.handle_message("console", private("u1", "q")).await.unwrap();
    let sent = h.sent_texts();
    assert!(sent.len() > 1);
    assert_eq!(sent.concat(), "你好。今天天气很好。再见");
}
