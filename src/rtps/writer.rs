use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex, MutexGuard},
  thread::{self, JoinHandle},
  time::Duration,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use mio::{Events, Poll, PollOpt, Ready, Token};
use mio_extras::{
  channel as mio_channel,
  timer::{self, Timer},
};

use crate::{
  config::RtpsConfig,
  messages::submessages::submessages::*,
  network::{DataChannel, DataChannelFactory},
  result::{Error, Result},
  rtps::{
    fragment_splitter,
    message_receiver::MessageSubscriber,
    reader_proxy::ReaderProxy,
    walker::{walk, MessageContext, SubmessageVisitor, VisitResult},
    Message, MessageBuilder, UserSample,
  },
  structure::{
    cache_change::CacheChange,
    guid::{GuidPrefix, GUID},
    history_cache::HistoryCache,
    locator::Locator,
    qos::{DurabilityKind, ReliabilityKind, WriterQos},
    sequence_number::SequenceNumber,
    time::Timestamp,
  },
};

const HEARTBEAT_TIMER_TOKEN: Token = Token(0);
const STOP_HEARTBEAT_TOKEN: Token = Token(1);

// Messages to send once the writer lock is released.
type Outgoing = Vec<(Arc<dyn DataChannel>, GUID, Message)>;

struct MatchedReader {
  proxy: ReaderProxy,
  data_channel: Arc<dyn DataChannel>,
}

struct WriterInner {
  my_guid: GUID,
  qos: WriterQos,
  history_cache: HistoryCache,
  last_change_sequence_number: SequenceNumber,
  matched_readers: BTreeMap<GUID, MatchedReader>,
  heartbeat_count: i32,
  max_submessage_size: usize,
  closed: bool,
}

struct HeartbeatThread {
  stop_sender: mio_channel::Sender<()>,
  handle: JoinHandle<()>,
}

/// RTPS writer.
///
/// Reliable matched readers get data through the heartbeat cycle: the
/// writer announces its history every heartbeat period and resends what
/// the readers request in their AckNacks. Best-effort readers get every
/// new change pushed right away. AckNacks reach the writer through
/// [`MessageSubscriber::on_message`].
pub struct RtpsWriter {
  inner: Arc<Mutex<WriterInner>>,
  data_channel_factory: Arc<dyn DataChannelFactory>,
  heartbeat_period: Duration,
  heartbeat_thread: Mutex<Option<HeartbeatThread>>,
}

impl RtpsWriter {
  pub fn new(
    guid: GUID,
    qos: WriterQos,
    config: &RtpsConfig,
    data_channel_factory: Arc<dyn DataChannelFactory>,
  ) -> RtpsWriter {
    RtpsWriter {
      inner: Arc::new(Mutex::new(WriterInner {
        my_guid: guid,
        qos,
        history_cache: HistoryCache::new(),
        last_change_sequence_number: SequenceNumber::zero(),
        matched_readers: BTreeMap::new(),
        heartbeat_count: 0,
        max_submessage_size: config.max_submessage_size,
        closed: false,
      })),
      data_channel_factory,
      heartbeat_period: config.heartbeat_period,
      heartbeat_thread: Mutex::new(None),
    }
  }

  fn inner(&self) -> Result<MutexGuard<WriterInner>> {
    Ok(self.inner.lock()?)
  }

  pub fn guid(&self) -> Result<GUID> {
    Ok(self.inner()?.my_guid)
  }

  pub fn qos(&self) -> Result<WriterQos> {
    Ok(self.inner()?.qos)
  }

  /// Sequence number of the latest change, zero before the first one.
  pub fn last_change_sequence_number(&self) -> Result<SequenceNumber> {
    Ok(self.inner()?.last_change_sequence_number)
  }

  /// Count of the latest heartbeat sent, zero before the first one.
  pub fn heartbeat_count(&self) -> Result<i32> {
    Ok(self.inner()?.heartbeat_count)
  }

  /// Publishes `sample` as the next change of this writer and returns its
  /// sequence number.
  pub fn new_change(&self, sample: UserSample) -> Result<SequenceNumber> {
    let (sequence_number, outgoing) = {
      let mut inner = self.inner()?;
      if inner.closed {
        return Err(Error::Closed);
      }
      let sequence_number = inner.last_change_sequence_number.next();
      let change = CacheChange::new(
        inner.my_guid,
        sequence_number,
        Some(Timestamp::now()),
        sample.payload,
      )
      .with_inline_qos(Some(sample.user_parameters));
      let outgoing = inner.push_to_best_effort_readers(&change);
      if !inner.history_cache.add_change(change) {
        error!(
          "Writer {:?} already had a change {:?}",
          inner.my_guid, sequence_number
        );
        return Err(Error::PreconditionNotMet(format!(
          "sequence number {:?} reused",
          sequence_number
        )));
      }
      inner.last_change_sequence_number = sequence_number;
      (sequence_number, outgoing)
    };
    trace!("New change {:?}", sequence_number);
    send_all(outgoing);
    Ok(sequence_number)
  }

  /// Starts sending to `remote_reader_guid`. Matching an already matched
  /// reader changes nothing.
  pub fn matched_reader_add(
    &self,
    remote_reader_guid: GUID,
    unicast_locators: Vec<Locator>,
    reliability: ReliabilityKind,
  ) -> Result<()> {
    {
      let inner = self.inner()?;
      if inner.closed {
        return Err(Error::Closed);
      }
      if inner.matched_readers.contains_key(&remote_reader_guid) {
        debug!("Reader {:?} already matched", remote_reader_guid);
        return Ok(());
      }
    }
    let data_channel = self.data_channel_factory.connect(&unicast_locators)?;

    let outgoing = {
      let mut inner = self.inner()?;
      if inner.closed {
        data_channel.close();
        return Err(Error::Closed);
      }
      // matched by a concurrent call while we were connecting
      if inner.matched_readers.contains_key(&remote_reader_guid) {
        debug!("Reader {:?} already matched", remote_reader_guid);
        data_channel.close();
        return Ok(());
      }
      info!(
        "Writer {:?} matched {:?} reader {:?}",
        inner.my_guid, reliability, remote_reader_guid
      );
      let proxy = ReaderProxy::new(remote_reader_guid, unicast_locators, reliability);
      let replay = if !proxy.is_reliable() && inner.qos.durability == DurabilityKind::TransientLocal {
        let changes: Vec<&CacheChange> = inner
          .history_cache
          .get_all_after(inner.my_guid, SequenceNumber::zero());
        inner.data_messages(remote_reader_guid, &changes)
      } else {
        Vec::new()
      };
      inner.matched_readers.insert(
        remote_reader_guid,
        MatchedReader {
          proxy,
          data_channel: data_channel.clone(),
        },
      );
      replay
        .into_iter()
        .map(|message| (data_channel.clone(), remote_reader_guid, message))
        .collect::<Outgoing>()
    };
    send_all(outgoing);
    self.start_heartbeat_thread()
  }

  pub fn matched_reader_remove(&self, remote_reader_guid: GUID) -> Result<()> {
    self.inner()?.remove_reader(remote_reader_guid);
    Ok(())
  }

  /// Removes every matched reader of the participant `guid_prefix`.
  pub fn matched_readers_remove(&self, guid_prefix: GuidPrefix) -> Result<()> {
    let mut inner = self.inner()?;
    let gone: Vec<GUID> = inner
      .matched_readers
      .keys()
      .filter(|guid| guid.prefix == guid_prefix)
      .copied()
      .collect();
    for guid in gone {
      inner.remove_reader(guid);
    }
    Ok(())
  }

  pub fn matched_readers(&self) -> Result<Vec<GUID>> {
    Ok(self.inner()?.matched_readers.keys().copied().collect())
  }

  /// Runs `f` on the proxy of a matched reader, e.g. to read its
  /// acknowledgement state.
  pub fn with_reader_proxy<T>(
    &self,
    remote_reader_guid: GUID,
    f: impl FnOnce(&ReaderProxy) -> T,
  ) -> Result<Option<T>> {
    Ok(
      self
        .inner()?
        .matched_readers
        .get(&remote_reader_guid)
        .map(|r| f(&r.proxy)),
    )
  }

  /// One heartbeat period worth of work: heartbeats to every reliable
  /// reader, then the changes they requested. The heartbeat thread calls
  /// this periodically.
  pub fn heartbeat_tick(&self) -> Result<()> {
    heartbeat_tick(&self.inner)
  }

  /// Stops the heartbeat thread and drops every reader proxy. New changes
  /// are refused afterwards.
  pub fn close(&self) -> Result<()> {
    {
      let mut inner = self.inner()?;
      if !inner.closed {
        info!("Closing writer {:?}", inner.my_guid);
      }
      inner.closed = true;
      let readers: Vec<GUID> = inner.matched_readers.keys().copied().collect();
      for guid in readers {
        inner.remove_reader(guid);
      }
    }
    let heartbeat_thread = self.heartbeat_thread.lock()?.take();
    if let Some(HeartbeatThread {
      stop_sender,
      handle,
    }) = heartbeat_thread
    {
      // an error means the thread already stopped
      let _ = stop_sender.send(());
      if handle.join().is_err() {
        error!("Heartbeat thread panicked");
      }
    }
    Ok(())
  }

  fn start_heartbeat_thread(&self) -> Result<()> {
    let mut heartbeat_thread = self.heartbeat_thread.lock()?;
    if heartbeat_thread.is_some() {
      return Ok(());
    }
    let (stop_sender, stop_receiver) = mio_channel::channel::<()>();
    let inner = self.inner.clone();
    let period = self.heartbeat_period;
    let handle = thread::Builder::new()
      .name("rtps heartbeat".to_string())
      .spawn(move || {
        if let Err(e) = heartbeat_loop(&inner, period, &stop_receiver) {
          error!("Heartbeat thread failed: {}", e);
        }
      })?;
    *heartbeat_thread = Some(HeartbeatThread {
      stop_sender,
      handle,
    });
    Ok(())
  }
}

impl Drop for RtpsWriter {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      error!("Closing writer on drop failed: {}", e);
    }
  }
}

impl MessageSubscriber for RtpsWriter {
  fn on_message(&self, message: &Message) {
    match self.inner() {
      Ok(mut inner) => {
        if inner.closed {
          return;
        }
        walk(message, &mut AckNackVisitor { inner: &mut *inner });
      }
      Err(e) => error!("Writer could not process message: {}", e),
    }
  }
}

// Timer with few slots. Only one timeout is ever pending.
fn new_heartbeat_timer() -> Timer<()> {
  timer::Builder::default().num_slots(4).capacity(2).build()
}

fn heartbeat_loop(
  inner: &Mutex<WriterInner>,
  period: Duration,
  stop_receiver: &mio_channel::Receiver<()>,
) -> Result<()> {
  let poll = Poll::new()?;
  let mut heartbeat_timer = new_heartbeat_timer();
  poll.register(
    &heartbeat_timer,
    HEARTBEAT_TIMER_TOKEN,
    Ready::readable(),
    PollOpt::edge(),
  )?;
  poll.register(
    stop_receiver,
    STOP_HEARTBEAT_TOKEN,
    Ready::readable(),
    PollOpt::edge(),
  )?;
  heartbeat_timer.set_timeout(period, ());
  debug!("Heartbeat thread started, period {:?}", period);

  let mut events = Events::with_capacity(4);
  loop {
    poll.poll(&mut events, None)?;
    for event in &events {
      match event.token() {
        STOP_HEARTBEAT_TOKEN => {
          debug!("Heartbeat thread stopped");
          return Ok(());
        }
        HEARTBEAT_TIMER_TOKEN => {
          while heartbeat_timer.poll().is_some() {
            heartbeat_tick(inner)?;
          }
          heartbeat_timer.set_timeout(period, ());
        }
        other => warn!("Heartbeat thread got unknown token {:?}", other),
      }
    }
  }
}

fn heartbeat_tick(inner: &Mutex<WriterInner>) -> Result<()> {
  let outgoing = {
    let mut inner = inner.lock()?;
    if inner.closed {
      return Ok(());
    }
    let mut outgoing = inner.heartbeats();
    outgoing.extend(inner.requested_changes());
    outgoing
  };
  send_all(outgoing);
  Ok(())
}

fn send_all(outgoing: Outgoing) {
  for (data_channel, destination, message) in outgoing {
    if let Err(e) = data_channel.send(destination, &message) {
      warn!("Sending to {:?} failed: {:?}", destination, e);
    }
  }
}

impl WriterInner {
  fn remove_reader(&mut self, remote_reader_guid: GUID) {
    if let Some(reader) = self.matched_readers.remove(&remote_reader_guid) {
      info!(
        "Writer {:?} unmatched reader {:?}",
        self.my_guid, remote_reader_guid
      );
      reader.data_channel.close();
    }
  }

  fn push_to_best_effort_readers(&self, change: &CacheChange) -> Outgoing {
    let mut outgoing = Vec::new();
    for reader in self.matched_readers.values() {
      if reader.proxy.is_reliable() {
        continue;
      }
      let reader_guid = reader.proxy.remote_reader_guid;
      for message in self.data_messages(reader_guid, &[change]) {
        outgoing.push((reader.data_channel.clone(), reader_guid, message));
      }
    }
    outgoing
  }

  fn heartbeats(&mut self) -> Outgoing {
    if self.history_cache.is_empty() {
      trace!("Nothing to announce, no heartbeat");
      return Vec::new();
    }
    if !self.matched_readers.values().any(|r| r.proxy.is_reliable()) {
      return Vec::new();
    }
    let first_sn = self.history_cache.seq_num_min(self.my_guid);
    let last_sn = self.history_cache.seq_num_max(self.my_guid);
    self.heartbeat_count += 1;
    trace!(
      "Writer {:?} heartbeat {} [{:?}, {:?}]",
      self.my_guid,
      self.heartbeat_count,
      first_sn,
      last_sn
    );
    self
      .matched_readers
      .values()
      .filter(|r| r.proxy.is_reliable())
      .map(|reader| {
        let reader_guid = reader.proxy.remote_reader_guid;
        let message = MessageBuilder::new()
          .dst_submessage(reader_guid.prefix)
          .heartbeat_msg(
            reader_guid.entity_id,
            self.my_guid.entity_id,
            first_sn,
            last_sn,
            self.heartbeat_count,
            false,
          )
          .add_header_and_build(self.my_guid.prefix);
        (reader.data_channel.clone(), reader_guid, message)
      })
      .collect()
  }

  // Resends what reliable readers asked for in their latest AckNack.
  // Numbers no longer in the history cache are left out.
  fn requested_changes(&self) -> Outgoing {
    let mut outgoing = Vec::new();
    for reader in self.matched_readers.values() {
      if !reader.proxy.is_reliable() || !reader.proxy.has_requested_changes() {
        continue;
      }
      let reader_guid = reader.proxy.remote_reader_guid;
      let requested = reader.proxy.requested_changes();
      let changes = self.history_cache.find_all(self.my_guid, &requested);
      debug!(
        "Resending {} of {} requested changes to {:?}",
        changes.len(),
        requested.len(),
        reader_guid
      );
      for message in self.data_messages(reader_guid, &changes) {
        outgoing.push((reader.data_channel.clone(), reader_guid, message));
      }
    }
    outgoing
  }

  /// Packs `changes` for one reader. Consecutive DATA submessages share a
  /// message as long as they fit into `max_submessage_size`. A change that
  /// does not fit into one DATA goes as DATA_FRAGs, one per message.
  fn data_messages(&self, reader_guid: GUID, changes: &[&CacheChange]) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut builder = MessageBuilder::new();
    for change in changes {
      if fragment_splitter::fits_in_data(change, self.max_submessage_size) {
        let next = MessageBuilder::new()
          .ts_msg(change.source_timestamp)
          .data_msg(change, reader_guid.entity_id);
        if !builder.is_empty()
          && builder.submessages_length() + next.submessages_length() > self.max_submessage_size
        {
          messages.push(builder.add_header_and_build(self.my_guid.prefix));
          builder = MessageBuilder::new();
        }
        if builder.is_empty() {
          builder = builder.dst_submessage(reader_guid.prefix);
        }
        builder = builder
          .ts_msg(change.source_timestamp)
          .data_msg(change, reader_guid.entity_id);
      } else {
        if !builder.is_empty() {
          messages.push(builder.add_header_and_build(self.my_guid.prefix));
          builder = MessageBuilder::new();
        }
        messages.extend(self.data_frag_messages(reader_guid, change));
      }
    }
    if !builder.is_empty() {
      messages.push(builder.add_header_and_build(self.my_guid.prefix));
    }
    messages
  }

  fn data_frag_messages(&self, reader_guid: GUID, change: &CacheChange) -> Vec<Message> {
    let fragment_size =
      fragment_splitter::fragment_size(self.max_submessage_size, change.inline_qos.as_ref());
    if fragment_size == 0 {
      warn!(
        "Change {:?} cannot be sent: inline QoS leaves no room for fragments",
        change.sequence_number
      );
      return Vec::new();
    }
    let fragments = fragment_splitter::split(change, reader_guid.entity_id, fragment_size);
    debug!(
      "Sending {:?} to {:?} in {} fragments of {} bytes",
      change.sequence_number,
      reader_guid,
      fragments.len(),
      fragment_size
    );
    fragments
      .into_iter()
      .map(|data_frag| {
        MessageBuilder::new()
          .dst_submessage(reader_guid.prefix)
          .ts_msg(change.source_timestamp)
          .data_frag_msg(data_frag)
          .add_header_and_build(self.my_guid.prefix)
      })
      .collect()
  }
}

// Applies AckNacks addressed to this writer.
struct AckNackVisitor<'a> {
  inner: &'a mut WriterInner,
}

impl<'a> SubmessageVisitor for AckNackVisitor<'a> {
  fn on_ack_nack(&mut self, context: &MessageContext, ack_nack: &AckNack) -> VisitResult {
    let my_guid = self.inner.my_guid;
    if ack_nack.writer_id != my_guid.entity_id || !context.is_addressed_to(my_guid.prefix) {
      return VisitResult::Continue;
    }
    let reader_guid = GUID::new(context.source_guid_prefix, ack_nack.reader_id);
    match self.inner.matched_readers.get_mut(&reader_guid) {
      Some(reader) => {
        if reader.proxy.handle_ack_nack(ack_nack) {
          trace!(
            "AckNack {} from {:?}: acked up to {:?}, requested {:?}",
            ack_nack.count,
            reader_guid,
            reader.proxy.highest_acked(),
            reader.proxy.requested_changes()
          );
        }
      }
      None => trace!("AckNack from unmatched reader {:?} ignored", reader_guid),
    }
    VisitResult::Continue
  }
}
