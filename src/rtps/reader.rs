use std::{
  cmp::min,
  collections::BTreeMap,
  mem,
  sync::{Arc, Mutex, MutexGuard},
};

use enumflags2::BitFlags;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use mio_extras::channel::{self as mio_channel, TrySendError};

use crate::{
  config::RtpsConfig,
  messages::submessages::submessages::*,
  network::{DataChannel, DataChannelFactory},
  result::{Error, Result},
  rtps::{
    fragment_assembler::FragmentAssembler,
    message_receiver::MessageSubscriber,
    walker::{walk, FilterByEntityId, MessageContext, SubmessageVisitor, VisitResult},
    writer_proxy::WriterProxy,
    Message, Sample,
  },
  structure::{
    cache_change::CacheChange,
    guid::{EntityId, GuidPrefix, GUID},
    history_cache::HistoryCache,
    locator::Locator,
    qos::{DurabilityKind, ReaderQos, ReliabilityKind},
    sequence_number::SequenceNumber,
  },
};

/// Receiving end of a reader's sample channel.
pub type SampleReceiver = mio_channel::Receiver<Sample>;

struct MatchedWriter {
  proxy: WriterProxy,
  // opened on the first AckNack
  data_channel: Option<Arc<dyn DataChannel>>,
}

struct ReaderInner {
  my_guid: GUID,
  qos: ReaderQos,
  matched_writers: BTreeMap<GUID, MatchedWriter>,
  // Reliable only: received changes waiting for their turn.
  history_cache: HistoryCache,
  fragment_assembler: FragmentAssembler,
  sample_sender: Option<mio_channel::SyncSender<Sample>>,
  // Samples delivered while processing the current message. They go into
  // the channel once the lock is released.
  outbox: Vec<Sample>,
}

// What processing one message produced, sent without holding the reader
// lock.
struct Outgoing {
  samples: Vec<Sample>,
  sample_sender: Option<mio_channel::SyncSender<Sample>>,
  ack_nacks: Vec<(Arc<dyn DataChannel>, GUID, Message)>,
}

/// RTPS reader with best-effort or reliable delivery.
///
/// Feed it decoded messages through [`MessageSubscriber::on_message`]; it
/// delivers samples of matched writers through the channel returned by
/// [`RtpsReader::new`]. Messages from writers that were not matched with
/// [`RtpsReader::matched_writer_add`] are ignored.
pub struct RtpsReader {
  inner: Mutex<ReaderInner>,
  // Held from processing a message until its samples are in the channel,
  // so that concurrent messages cannot reorder samples.
  delivery: Mutex<()>,
  data_channel_factory: Arc<dyn DataChannelFactory>,
}

impl RtpsReader {
  pub fn new(
    guid: GUID,
    qos: ReaderQos,
    config: &RtpsConfig,
    data_channel_factory: Arc<dyn DataChannelFactory>,
  ) -> (RtpsReader, SampleReceiver) {
    let (sample_sender, sample_receiver) =
      mio_channel::sync_channel::<Sample>(config.publisher_max_buffer_size);
    let reader = RtpsReader {
      inner: Mutex::new(ReaderInner {
        my_guid: guid,
        qos,
        matched_writers: BTreeMap::new(),
        history_cache: HistoryCache::new(),
        fragment_assembler: FragmentAssembler::new(config.max_sample_size),
        sample_sender: Some(sample_sender),
        outbox: Vec::new(),
      }),
      delivery: Mutex::new(()),
      data_channel_factory,
    };
    (reader, sample_receiver)
  }

  fn inner(&self) -> Result<MutexGuard<ReaderInner>> {
    Ok(self.inner.lock()?)
  }

  pub fn guid(&self) -> Result<GUID> {
    Ok(self.inner()?.my_guid)
  }

  /// Starts accepting changes from `remote_writer_guid`. Matching an
  /// already matched writer changes nothing.
  pub fn matched_writer_add(&self, remote_writer_guid: GUID, unicast_locators: Vec<Locator>) -> Result<()> {
    let mut inner = self.inner()?;
    if inner.sample_sender.is_none() {
      return Err(Error::Closed);
    }
    if inner.matched_writers.contains_key(&remote_writer_guid) {
      debug!("Writer {:?} already matched", remote_writer_guid);
      return Ok(());
    }
    info!("Reader {:?} matched writer {:?}", inner.my_guid, remote_writer_guid);
    inner.matched_writers.insert(
      remote_writer_guid,
      MatchedWriter {
        proxy: WriterProxy::new(remote_writer_guid, unicast_locators),
        data_channel: None,
      },
    );
    Ok(())
  }

  pub fn matched_writer_remove(&self, remote_writer_guid: GUID) -> Result<()> {
    let mut inner = self.inner()?;
    inner.remove_writer(remote_writer_guid);
    Ok(())
  }

  /// Removes every matched writer of the participant `guid_prefix`.
  pub fn matched_writers_remove(&self, guid_prefix: GuidPrefix) -> Result<()> {
    let mut inner = self.inner()?;
    let gone: Vec<GUID> = inner
      .matched_writers
      .keys()
      .filter(|guid| guid.prefix == guid_prefix)
      .copied()
      .collect();
    for guid in gone {
      inner.remove_writer(guid);
    }
    Ok(())
  }

  pub fn matched_writers(&self) -> Result<Vec<GUID>> {
    Ok(self.inner()?.matched_writers.keys().copied().collect())
  }

  /// Runs `f` on the proxy of a matched writer, e.g. to read its counters.
  pub fn with_writer_proxy<T>(&self, remote_writer_guid: GUID, f: impl FnOnce(&WriterProxy) -> T) -> Result<Option<T>> {
    Ok(
      self
        .inner()?
        .matched_writers
        .get(&remote_writer_guid)
        .map(|w| f(&w.proxy)),
    )
  }

  /// Drops all writer proxies and closes the sample channel.
  pub fn close(&self) -> Result<()> {
    let mut inner = self.inner()?;
    let writers: Vec<GUID> = inner.matched_writers.keys().copied().collect();
    for guid in writers {
      inner.remove_writer(guid);
    }
    inner.sample_sender = None;
    inner.outbox.clear();
    inner.history_cache.clear();
    Ok(())
  }

  /// Processes one message. Returns the samples it completed and the
  /// AckNacks that answer heartbeats in it, with the channels to send them
  /// on. The caller sends them after the reader lock is released.
  fn process_message(&self, message: &Message) -> Result<Outgoing> {
    let mut inner = self.inner()?;
    if inner.sample_sender.is_none() {
      trace!("Closed reader ignores message");
      return Ok(Outgoing {
        samples: vec![],
        sample_sender: None,
        ack_nacks: vec![],
      });
    }
    let my_guid = inner.my_guid;
    let mut filter = FilterByEntityId::new(my_guid.entity_id, ReaderVisitor { inner: &mut *inner });
    walk(message, &mut filter);

    // one AckNack per writer and received message
    let mut ack_nacks = Vec::new();
    let mut acked_writers = Vec::new();
    for writer in inner.matched_writers.values_mut() {
      if let Some(ack_nack) = writer.proxy.ack(my_guid) {
        acked_writers.push(writer.proxy.remote_writer_guid);
        if let Some(channel) = writer.data_channel_or_connect(&*self.data_channel_factory) {
          ack_nacks.push((channel, writer.proxy.remote_writer_guid, ack_nack));
        }
      }
    }
    // a heartbeat may have declared changes lost
    if inner.is_reliable() {
      for writer_guid in acked_writers {
        inner.deliver_in_order(writer_guid);
      }
    }

    Ok(Outgoing {
      samples: mem::take(&mut inner.outbox),
      sample_sender: inner.sample_sender.clone(),
      ack_nacks,
    })
  }

  // Blocks while the channel is full: a slow application slows down
  // reception instead of losing samples.
  fn send_samples(&self, sample_sender: &mio_channel::SyncSender<Sample>, samples: Vec<Sample>) {
    for sample in samples {
      match sample_sender.try_send(sample) {
        Ok(()) => (),
        Err(TrySendError::Full(sample)) => {
          warn!("Sample channel of reader is full, waiting");
          if sample_sender.send(sample).is_err() {
            debug!("Sample receiver is gone");
            return;
          }
        }
        Err(TrySendError::Disconnected(_)) => {
          debug!("Sample receiver is gone");
          return;
        }
        Err(TrySendError::Io(e)) => {
          error!("Sample channel failed: {:?}", e);
          return;
        }
      }
    }
  }
}

impl MessageSubscriber for RtpsReader {
  fn on_message(&self, message: &Message) {
    let delivery = match self.delivery.lock() {
      Ok(guard) => guard,
      Err(e) => {
        error!("Reader could not process message: {}", Error::from(e));
        return;
      }
    };
    let outgoing = match self.process_message(message) {
      Ok(outgoing) => outgoing,
      Err(e) => {
        error!("Reader could not process message: {}", e);
        return;
      }
    };
    if let Some(sample_sender) = &outgoing.sample_sender {
      self.send_samples(sample_sender, outgoing.samples);
    }
    drop(delivery);

    for (channel, writer_guid, ack_nack) in outgoing.ack_nacks {
      if let Err(e) = channel.send(writer_guid, &ack_nack) {
        warn!("Sending AckNack to {:?} failed: {:?}", writer_guid, e);
      }
    }
  }
}

impl MatchedWriter {
  fn data_channel_or_connect(&mut self, factory: &dyn DataChannelFactory) -> Option<Arc<dyn DataChannel>> {
    if self.data_channel.is_none() {
      match factory.connect(&self.proxy.unicast_locator_list) {
        Ok(channel) => self.data_channel = Some(channel),
        Err(e) => {
          warn!(
            "Cannot open channel to writer {:?} at {:?}: {:?}",
            self.proxy.remote_writer_guid, self.proxy.unicast_locator_list, e
          );
          return None;
        }
      }
    }
    self.data_channel.clone()
  }
}

impl ReaderInner {
  fn remove_writer(&mut self, remote_writer_guid: GUID) {
    if let Some(writer) = self.matched_writers.remove(&remote_writer_guid) {
      info!("Reader {:?} unmatched writer {:?}", self.my_guid, remote_writer_guid);
      if let Some(channel) = writer.data_channel {
        channel.close();
      }
    }
    self.fragment_assembler.remove_writer(remote_writer_guid);
    self.history_cache.remove_writer(remote_writer_guid);
  }

  fn is_reliable(&self) -> bool {
    self.qos.reliability == ReliabilityKind::Reliable
  }

  fn deliver(&mut self, change: CacheChange) {
    if self.sample_sender.is_none() {
      return;
    }
    trace!(
      "Deliver {:?} from {:?}",
      change.sequence_number,
      change.writer_guid
    );
    self.outbox.push(Sample::from(change));
  }

  fn new_change(&mut self, change: CacheChange) {
    if self.is_reliable() {
      self.new_reliable_change(change)
    } else {
      self.new_best_effort_change(change)
    }
  }

  // Delivers only changes newer than anything delivered so far.
  fn new_best_effort_change(&mut self, change: CacheChange) {
    let writer = match self.matched_writers.get_mut(&change.writer_guid) {
      Some(w) => w,
      None => return,
    };
    let sn = change.sequence_number;
    if writer.proxy.next_to_deliver.map_or(false, |next| sn < next) {
      trace!("Best effort: dropping old or duplicate {:?}", sn);
      return;
    }
    writer.proxy.next_to_deliver = Some(sn.next());
    self.fragment_assembler.garbage_collect_before(change.writer_guid, sn.next());
    self.deliver(change);
  }

  fn new_reliable_change(&mut self, change: CacheChange) {
    let writer_guid = change.writer_guid;
    let sn = change.sequence_number;
    let durability = self.qos.durability;
    let writer = match self.matched_writers.get_mut(&writer_guid) {
      Some(w) => w,
      None => return,
    };
    let next = match writer.proxy.next_to_deliver {
      Some(next) => next,
      None => {
        let baseline = match durability {
          DurabilityKind::TransientLocal => SequenceNumber::new(1),
          DurabilityKind::Volatile => sn,
        };
        debug!("Delivery from {:?} starts at {:?}", writer_guid, baseline);
        writer.proxy.forget_before(baseline);
        writer.proxy.next_to_deliver = Some(baseline);
        baseline
      }
    };
    if sn < next {
      trace!("{:?} from {:?} is before {:?}, ignored", sn, writer_guid, next);
      return;
    }
    if !self.history_cache.add_change(change) {
      return;
    }
    writer.proxy.received_change_set(sn);
    self.deliver_in_order(writer_guid);
  }

  // Delivers as many contiguous changes of `writer_guid` as possible.
  // Delivery steps over irrelevant numbers. Volatile readers also step
  // over lost ones; transient local readers wait for them.
  fn deliver_in_order(&mut self, writer_guid: GUID) {
    let durability = self.qos.durability;
    loop {
      let writer = match self.matched_writers.get_mut(&writer_guid) {
        Some(w) => w,
        None => return,
      };
      let next = match writer.proxy.next_to_deliver {
        Some(next) => next,
        None => return,
      };
      if let Some(change) = self.history_cache.remove_change(writer_guid, next) {
        writer.proxy.next_to_deliver = Some(next.next());
        writer.proxy.forget_before(next.next());
        self.deliver(change);
        continue;
      }

      let settled = writer.proxy.settled_before();
      let skip_to = match writer.proxy.irrelevant_until(next) {
        Some(last) => last.next(),
        None if durability == DurabilityKind::Volatile && next < settled => settled,
        None => break,
      };
      // never past a stored change
      let skip_to = match self.history_cache.get_all_after(writer_guid, next).first() {
        Some(stored) => min(stored.sequence_number, skip_to),
        None => skip_to,
      };
      if skip_to <= next {
        break;
      }
      trace!("Skipping {:?}..{:?} from {:?}", next, skip_to, writer_guid);
      writer.proxy.next_to_deliver = Some(skip_to);
      writer.proxy.forget_before(skip_to);
    }
    if let Some(next) = self
      .matched_writers
      .get(&writer_guid)
      .and_then(|w| w.proxy.next_to_deliver)
    {
      self.fragment_assembler.garbage_collect_before(writer_guid, next);
    }
  }
}

// Applies the submessages of one message to the reader state.
struct ReaderVisitor<'a> {
  inner: &'a mut ReaderInner,
}

impl<'a> ReaderVisitor<'a> {
  // The matched writer a writer submessage comes from, if it is for us.
  fn writer_guid(&self, context: &MessageContext, writer_id: EntityId) -> Option<GUID> {
    if !context.is_addressed_to(self.inner.my_guid.prefix) {
      trace!("Submessage for {:?} ignored", context.dest_guid_prefix);
      return None;
    }
    let writer_guid = GUID::new(context.source_guid_prefix, writer_id);
    if self.inner.matched_writers.contains_key(&writer_guid) {
      Some(writer_guid)
    } else {
      trace!("Submessage from unmatched writer {:?} ignored", writer_guid);
      None
    }
  }
}

impl<'a> SubmessageVisitor for ReaderVisitor<'a> {
  fn on_data(&mut self, context: &MessageContext, data: &Data) -> VisitResult {
    let writer_guid = match self.writer_guid(context, data.writer_id) {
      Some(guid) => guid,
      None => return VisitResult::Continue,
    };
    if !data.writer_sn.is_valid() {
      debug!("DATA {:?} from {:?} ignored", data.writer_sn, writer_guid);
      return VisitResult::Continue;
    }
    match &data.serialized_payload {
      Some(payload) => {
        let change = CacheChange::new(writer_guid, data.writer_sn, context.timestamp, payload.clone())
          .with_inline_qos(data.inline_qos.clone());
        self.inner.new_change(change);
      }
      None => debug!(
        "DATA {:?} from {:?} without payload ignored",
        data.writer_sn, writer_guid
      ),
    }
    VisitResult::Continue
  }

  fn on_data_frag(&mut self, context: &MessageContext, data_frag: &DataFrag) -> VisitResult {
    let writer_guid = match self.writer_guid(context, data_frag.writer_id) {
      Some(guid) => guid,
      None => return VisitResult::Continue,
    };
    if !data_frag.writer_sn.is_valid() {
      debug!("DATA_FRAG {:?} from {:?} ignored", data_frag.writer_sn, writer_guid);
      return VisitResult::Continue;
    }
    let already_delivered = self
      .inner
      .matched_writers
      .get(&writer_guid)
      .and_then(|w| w.proxy.next_to_deliver)
      .map_or(false, |next| data_frag.writer_sn < next);
    if already_delivered {
      trace!("DATA_FRAG for delivered {:?} ignored", data_frag.writer_sn);
      return VisitResult::Continue;
    }
    if let Some(change) = self
      .inner
      .fragment_assembler
      .new_datafrag(writer_guid, data_frag, context.timestamp)
    {
      self.inner.new_change(change);
    }
    VisitResult::Continue
  }

  fn on_gap(&mut self, context: &MessageContext, gap: &Gap) -> VisitResult {
    if !self.inner.is_reliable() {
      return VisitResult::Continue;
    }
    let writer_guid = match self.writer_guid(context, gap.writer_id) {
      Some(guid) => guid,
      None => return VisitResult::Continue,
    };
    if let Some(writer) = self.inner.matched_writers.get_mut(&writer_guid) {
      writer.proxy.handle_gap(gap);
    }
    self.inner.deliver_in_order(writer_guid);
    VisitResult::Continue
  }

  fn on_heartbeat(
    &mut self,
    context: &MessageContext,
    heartbeat: &Heartbeat,
    flags: BitFlags<HEARTBEAT_Flags>,
  ) -> VisitResult {
    if !self.inner.is_reliable() {
      return VisitResult::Continue;
    }
    let writer_guid = match self.writer_guid(context, heartbeat.writer_id) {
      Some(guid) => guid,
      None => return VisitResult::Continue,
    };
    if let Some(writer) = self.inner.matched_writers.get_mut(&writer_guid) {
      writer
        .proxy
        .handle_heartbeat(heartbeat, flags.contains(HEARTBEAT_Flags::Final));
    }
    VisitResult::Continue
  }
}
