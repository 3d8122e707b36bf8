//! 核心流程端到端测试
//!
//! 覆盖会话生命周期：创建 → 发消息 → 读取 → 元数据变更 → 删除，
//! 以及贯穿其中的缓存一致性与事件发布。

use application::{ApplicationError, CreateConversationCommand, SendMessageCommand};
use domain::{
    ConversationEvent, ConversationId, ConversationListQuery, ConversationStatus,
    ConversationUpdate, MessageRole, RequestIdentity, UserId,
};
use tests::build_core;
use uuid::Uuid;

fn identity() -> RequestIdentity {
    RequestIdentity::new(UserId::new(Uuid::new_v4()), "203.0.113.10")
}

fn create_command(title: &str) -> CreateConversationCommand {
    CreateConversationCommand {
        title: title.to_string(),
        mentor: "mentor-systems".to_string(),
        tags: vec!["backend".to_string()],
    }
}

fn send_command(conversation_id: ConversationId, content: &str) -> SendMessageCommand {
    SendMessageCommand {
        conversation_id,
        role: MessageRole::User,
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_full_conversation_lifecycle() {
    let core = build_core();
    let identity = identity();
    let mut events = core.event_bus.subscribe_async();

    // 创建
    let conversation = core
        .conversation_service
        .create_conversation(&identity, create_command("分布式系统求教"))
        .await
        .unwrap();
    assert_eq!(conversation.status, ConversationStatus::Active);

    // 发两条消息，序号连续
    let first = core
        .message_service
        .send_message(&identity, send_command(conversation.id, "什么是线性一致性？"))
        .await
        .unwrap();
    let second = core
        .message_service
        .send_message(&identity, send_command(conversation.id, "和顺序一致性的区别？"))
        .await
        .unwrap();
    assert_eq!(first.order, 1);
    assert_eq!(second.order, 2);

    // 读取消息（回源后缓存）
    let records = core
        .message_service
        .get_messages(&identity, conversation.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].order, 1);
    assert_eq!(records[1].order, 2);

    // 更新标题后读到新值
    let update = ConversationUpdate {
        title: Some("分布式一致性求教".to_string()),
        ..ConversationUpdate::default()
    };
    core.conversation_service
        .update_conversation(&identity, conversation.id, update)
        .await
        .unwrap();
    let detail = core
        .conversation_service
        .get_conversation(&identity, conversation.id)
        .await
        .unwrap();
    assert_eq!(detail.title, "分布式一致性求教");

    // 状态变更事件携带变更前状态
    core.conversation_service
        .set_status(&identity, conversation.id, ConversationStatus::Completed)
        .await
        .unwrap();

    // 删除后读取映射为 NotFound
    core.conversation_service
        .delete_conversation(&identity, conversation.id)
        .await
        .unwrap();
    let missing = core
        .conversation_service
        .get_conversation(&identity, conversation.id)
        .await;
    assert!(matches!(missing, Err(ApplicationError::NotFound(id)) if id == conversation.id));

    // 事件按发布顺序到达
    let mut observed = Vec::new();
    for _ in 0..6 {
        observed.push(events.recv().await.unwrap().event_type());
    }
    assert_eq!(
        observed,
        vec![
            "conversation_created",
            "message_appended",
            "message_appended",
            "conversation_updated",
            "status_changed",
            "conversation_deleted",
        ]
    );
}

#[tokio::test]
async fn test_status_change_event_carries_old_status() {
    let core = build_core();
    let identity = identity();
    let mut events = core.event_bus.subscribe_async();

    let conversation = core
        .conversation_service
        .create_conversation(&identity, create_command("职业规划"))
        .await
        .unwrap();
    core.conversation_service
        .set_status(&identity, conversation.id, ConversationStatus::Archived)
        .await
        .unwrap();

    // 跳过创建事件
    events.recv().await.unwrap();
    match events.recv().await.unwrap() {
        ConversationEvent::StatusChanged {
            old_status,
            new_status,
            ..
        } => {
            assert_eq!(old_status, ConversationStatus::Active);
            assert_eq!(new_status, ConversationStatus::Archived);
        }
        other => panic!("unexpected event: {}", other.event_type()),
    }
}

#[tokio::test]
async fn test_message_append_refreshes_read_path() {
    let core = build_core();
    let identity = identity();

    let conversation = core
        .conversation_service
        .create_conversation(&identity, create_command("算法练习"))
        .await
        .unwrap();

    core.message_service
        .send_message(&identity, send_command(conversation.id, "第一问"))
        .await
        .unwrap();
    assert_eq!(
        core.message_service
            .get_messages(&identity, conversation.id)
            .await
            .unwrap()
            .len(),
        1
    );

    // 追加使消息缓存同步失效，写后读立即可见
    core.message_service
        .send_message(&identity, send_command(conversation.id, "第二问"))
        .await
        .unwrap();
    assert_eq!(
        core.message_service
            .get_messages(&identity, conversation.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_failed_persistence_leaves_gap_and_keeps_core_consistent() {
    let core = build_core();
    let identity = identity();

    let conversation = core
        .conversation_service
        .create_conversation(&identity, create_command("故障演练"))
        .await
        .unwrap();

    core.message_store.fail_next_append();
    let failed = core
        .message_service
        .send_message(&identity, send_command(conversation.id, "这条会失败"))
        .await;
    assert!(matches!(failed, Err(ApplicationError::Repository(_))));
    assert_eq!(core.message_store.message_count(conversation.id), 0);

    // 重试拿到新序号，序号 1 永久作废
    let retried = core
        .message_service
        .send_message(&identity, send_command(conversation.id, "重试成功"))
        .await
        .unwrap();
    assert_eq!(retried.order, 2);

    let records = core
        .message_service
        .get_messages(&identity, conversation.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].order, 2);
}

#[tokio::test]
async fn test_list_pagination_and_filtering() {
    let core = build_core();
    let identity = identity();

    for index in 1..=5 {
        core.conversation_service
            .create_conversation(&identity, create_command(&format!("会话 {}", index)))
            .await
            .unwrap();
    }

    let query = ConversationListQuery {
        limit: 2,
        ..ConversationListQuery::default()
    };
    let page = core
        .conversation_service
        .list_conversations(&identity, &query)
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);

    let query = ConversationListQuery {
        page: 3,
        limit: 2,
        ..ConversationListQuery::default()
    };
    let last_page = core
        .conversation_service
        .list_conversations(&identity, &query)
        .await
        .unwrap();
    assert_eq!(last_page.items.len(), 1);

    // 搜索词命中单个标题
    let query = ConversationListQuery {
        search: Some("会话 3".to_string()),
        ..ConversationListQuery::default()
    };
    let filtered = core
        .conversation_service
        .list_conversations(&identity, &query)
        .await
        .unwrap();
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.items[0].title, "会话 3");

    // 其他用户看不到这些会话
    let stranger = identity_for_addr("203.0.113.99");
    let empty = core
        .conversation_service
        .list_conversations(&stranger, &ConversationListQuery::default())
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
}

fn identity_for_addr(addr: &str) -> RequestIdentity {
    RequestIdentity::new(UserId::new(Uuid::new_v4()), addr)
}

#[tokio::test]
async fn test_sync_subscriber_runs_in_publisher_call_stack() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let core = build_core();
    let identity = identity();
    let appended = Arc::new(AtomicUsize::new(0));

    let appended_clone = Arc::clone(&appended);
    core.event_bus
        .subscribe(
            "message_appended",
            Arc::new(move |event| {
                if let ConversationEvent::MessageAppended { order, .. } = event {
                    appended_clone.fetch_add(*order as usize, Ordering::SeqCst);
                }
                Ok(())
            }),
        )
        .unwrap();

    let conversation = core
        .conversation_service
        .create_conversation(&identity, create_command("事件观察"))
        .await
        .unwrap();
    core.message_service
        .send_message(&identity, send_command(conversation.id, "触发事件"))
        .await
        .unwrap();

    // publish 返回即全部同步订阅者执行完毕
    assert_eq!(appended.load(Ordering::SeqCst), 1);
}
