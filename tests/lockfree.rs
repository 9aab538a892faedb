/*!
 * Lock-free structures tests entry point
 */

#[path = "lockfree/queue_test.rs"]
mod queue_test;

#[path = "lockfree/dual_queue_test.rs"]
mod dual_queue_test;

#[path = "lockfree/mailbox_test.rs"]
mod mailbox_test;

#[path = "lockfree/message_box_test.rs"]
mod message_box_test;
